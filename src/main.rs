use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn};

mod args;
mod auth;
mod backend;
mod blog;
mod flaskr;
mod page;
mod post;
mod routes;
mod session;
mod time;
mod user;

use args::{Args, Command, DEFAULT_SECRET_KEY};
use backend::Backend;
use flaskr::Flaskr;
use session::SessionCookies;

#[tokio::main]
async fn main() -> ExitCode {
    pretty_env_logger::init();

    let args = Args::parse();

    let instance = args.instance_path();
    if let Err(e) = std::fs::create_dir_all(instance) {
        error!("couldn't create {}: {e}", instance.display());
        return ExitCode::FAILURE;
    }

    let Ok(backend) = Backend::new(&args.database()).await else {
        return ExitCode::FAILURE;
    };

    if let Some(Command::InitDb) = args.command() {
        if backend.reset().await.is_err() {
            return ExitCode::FAILURE;
        }
        println!("Initialized the database.");
        return ExitCode::SUCCESS;
    }

    let addr = match args.addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!("invalid address: {e}");
            return ExitCode::FAILURE;
        }
    };

    if args.secret_key() == DEFAULT_SECRET_KEY {
        warn!("using the default secret key, session cookies can be forged");
    }

    let cookies = SessionCookies::new(args.secret_key(), args.secure());
    let app = Arc::new(Flaskr::new(backend, cookies));

    info!("listening on {addr}");
    warp::serve(routes::routes(app)).run(addr).await;

    ExitCode::SUCCESS
}
