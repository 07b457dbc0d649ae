use std::{convert::Infallible, sync::Arc};

use log::error;
use serde::de::DeserializeOwned;
use warp::http::{StatusCode, Uri};
use warp::reply::{Reply, Response};
use warp::{Filter, Rejection};

use crate::auth::{login_required, with_context, AuthError, Credentials};
use crate::blog::BlogError;
use crate::flaskr::{self, Context, Flaskr};
use crate::page;
use crate::post::PostForm;
use crate::user::User;

const INDEX: &str = "/";
const LOGIN: &str = "/auth/login";

const FORM_LIMIT: u64 = 16 * 1024;

pub fn routes(app: Arc<Flaskr>) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let hello = warp::path!("hello")
        .and(warp::get())
        .and(with_context(Arc::clone(&app)))
        .map(|app: Arc<Flaskr>, ctx: Context| app.finish(ctx.session, "Hello, World!"));

    let auth = register(Arc::clone(&app))
        .or(login(Arc::clone(&app)))
        .unify()
        .or(logout(Arc::clone(&app)))
        .unify();

    let blog = index(Arc::clone(&app))
        .or(create(Arc::clone(&app)))
        .unify()
        .or(update(Arc::clone(&app)))
        .unify()
        .or(delete(app))
        .unify();

    hello
        .or(auth)
        .or(blog)
        .recover(handle_rejection)
        .with(warp::log("flaskr"))
}

fn form<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Copy
where
    T: DeserializeOwned + Send,
{
    warp::body::content_length_limit(FORM_LIMIT).and(warp::body::form())
}

fn redirect(to: &'static str) -> Response {
    warp::redirect::found(Uri::from_static(to)).into_response()
}

fn reject(e: flaskr::Error) -> Rejection {
    warp::reject::custom(e)
}

/// Render a page, surfacing any flashed messages.
fn render(app: &Flaskr, mut ctx: Context, title: &str, content: &str) -> Response {
    let flashes = ctx.session.take_flashes();
    let page = page::render(title, ctx.user.as_ref(), &flashes, content);

    app.finish(ctx.session, page)
}

fn register(
    app: Arc<Flaskr>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let show = |app: Arc<Flaskr>, ctx: Context| {
        render(&app, ctx, "Register", &page::auth_form("Register"))
    };

    let get = warp::path!("auth" / "register")
        .and(warp::get())
        .and(with_context(Arc::clone(&app)))
        .map(show);

    let post = warp::path!("auth" / "register")
        .and(warp::post())
        .and(with_context(app))
        .and(form())
        .and_then(move |app: Arc<Flaskr>, mut ctx: Context, creds: Credentials| async move {
            match app.register(&creds).await {
                Ok(_) => Ok(app.finish(ctx.session, redirect(LOGIN))),
                Err(AuthError::Failed(e)) => Err(reject(e)),
                Err(e) => {
                    ctx.session.flash(e.to_string());
                    Ok(show(app, ctx))
                }
            }
        });

    get.or(post).unify()
}

fn login(
    app: Arc<Flaskr>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let show = |app: Arc<Flaskr>, ctx: Context| {
        render(&app, ctx, "Log In", &page::auth_form("Log In"))
    };

    let get = warp::path!("auth" / "login")
        .and(warp::get())
        .and(with_context(Arc::clone(&app)))
        .map(show);

    let post = warp::path!("auth" / "login")
        .and(warp::post())
        .and(with_context(app))
        .and(form())
        .and_then(move |app: Arc<Flaskr>, mut ctx: Context, creds: Credentials| async move {
            match app.login(&mut ctx.session, &creds).await {
                Ok(_) => Ok(app.finish(ctx.session, redirect(INDEX))),
                Err(AuthError::Failed(e)) => Err(reject(e)),
                Err(e) => {
                    ctx.session.flash(e.to_string());
                    Ok(show(app, ctx))
                }
            }
        });

    get.or(post).unify()
}

fn logout(
    app: Arc<Flaskr>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("auth" / "logout")
        .and(warp::get())
        .and(with_context(app))
        .map(|app: Arc<Flaskr>, mut ctx: Context| {
            app.logout(&mut ctx.session);
            app.finish(ctx.session, redirect(INDEX))
        })
}

fn index(
    app: Arc<Flaskr>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path::end()
        .and(warp::get())
        .and(with_context(app))
        .and_then(|app: Arc<Flaskr>, ctx: Context| async move {
            let posts = app.posts().await.map_err(reject)?;
            let content = page::index(&posts, ctx.user.as_ref());

            Ok::<_, Rejection>(render(&app, ctx, "Posts", &content))
        })
}

fn create(
    app: Arc<Flaskr>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let get = warp::path!("create")
        .and(warp::get())
        .and(login_required(with_context(Arc::clone(&app))))
        .map(|app: Arc<Flaskr>, ctx: Context, _user: User| {
            render(&app, ctx, "New Post", &page::post_form("", "", None))
        });

    let post = warp::path!("create")
        .and(warp::post())
        .and(login_required(with_context(app)))
        .and(form())
        .and_then(|app: Arc<Flaskr>, mut ctx: Context, user: User, form: PostForm| async move {
            match app.create_post(&user, &form).await {
                Ok(_) => Ok(app.finish(ctx.session, redirect(INDEX))),
                Err(BlogError::Failed(e)) => Err(reject(e)),
                Err(e) => {
                    ctx.session.flash(e.to_string());
                    let content = page::post_form(&form.title, &form.body, None);
                    Ok(render(&app, ctx, "New Post", &content))
                }
            }
        });

    get.or(post).unify()
}

fn update(
    app: Arc<Flaskr>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let get = warp::path!(i64 / "update")
        .and(warp::get())
        .and(login_required(with_context(Arc::clone(&app))))
        .and_then(|id: i64, app: Arc<Flaskr>, ctx: Context, user: User| async move {
            let post = app.get_post(id, Some(&user)).await.map_err(reject)?;
            let content = page::post_form(&post.title, &post.body, Some(id));

            let title = format!("Edit \"{}\"", post.title);
            Ok::<_, Rejection>(render(&app, ctx, &title, &content))
        });

    let post = warp::path!(i64 / "update")
        .and(warp::post())
        .and(login_required(with_context(app)))
        .and(form())
        .and_then(|id: i64, app: Arc<Flaskr>, mut ctx: Context, user: User, form: PostForm| async move {
            match app.update_post(id, &user, &form).await {
                Ok(()) => Ok(app.finish(ctx.session, redirect(INDEX))),
                Err(BlogError::Failed(e)) => Err(reject(e)),
                Err(e) => {
                    ctx.session.flash(e.to_string());
                    let content = page::post_form(&form.title, &form.body, Some(id));
                    Ok(render(&app, ctx, "Edit", &content))
                }
            }
        });

    get.or(post).unify()
}

fn delete(
    app: Arc<Flaskr>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!(i64 / "delete")
        .and(warp::post())
        .and(login_required(with_context(app)))
        .and_then(|id: i64, app: Arc<Flaskr>, ctx: Context, user: User| async move {
            app.delete_post(id, &user).await.map_err(reject)?;

            Ok::<_, Rejection>(app.finish(ctx.session, redirect(INDEX)))
        })
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if let Some(e) = err.find::<flaskr::Error>() {
        if matches!(e, flaskr::Error::LoginRequired) {
            return Ok(redirect(LOGIN));
        }
        return Ok(status(e.to_string(), (*e).into()));
    }

    if err.is_not_found() {
        return Ok(status("Not Found".into(), StatusCode::NOT_FOUND));
    }

    if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        return Ok(status(format!("Bad Request: {e}"), StatusCode::BAD_REQUEST));
    }

    if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        return Ok(status("Payload Too Large".into(), StatusCode::PAYLOAD_TOO_LARGE));
    }

    // checked ahead of 405: the route's other-method sibling is in the same rejection
    if err.find::<warp::reject::LengthRequired>().is_some() {
        return Ok(status("Length Required".into(), StatusCode::LENGTH_REQUIRED));
    }

    if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        return Ok(status(
            "Method Not Allowed".into(),
            StatusCode::METHOD_NOT_ALLOWED,
        ));
    }

    error!("unhandled rejection: {err:?}");
    Ok(status(
        "Internal Server Error".into(),
        StatusCode::INTERNAL_SERVER_ERROR,
    ))
}

fn status(body: String, code: StatusCode) -> Response {
    warp::reply::with_status(body, code).into_response()
}
