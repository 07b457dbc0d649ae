//! Bare HTML for the few pages the app serves.

use warp::reply::{html, Html};

use crate::post::Post;
use crate::user::User;

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render(title: &str, user: Option<&User>, flashes: &[String], content: &str) -> Html<String> {
    let nav = match user {
        Some(user) => format!(
            r#"<li><span>{}</span><li><a href="/auth/logout">Log Out</a>"#,
            escape(&user.username)
        ),
        None => {
            r#"<li><a href="/auth/register">Register</a><li><a href="/auth/login">Log In</a>"#
                .to_string()
        }
    };

    let messages: String = flashes
        .iter()
        .map(|message| format!(r#"<div class="flash">{}</div>"#, escape(message)))
        .collect();

    html(format!(
        "<!doctype html>\n\
         <title>{title} - Flaskr</title>\n\
         <nav><h1><a href=\"/\">Flaskr</a></h1><ul>{nav}</ul></nav>\n\
         <section class=\"content\">\n\
         <header><h1>{title}</h1></header>\n\
         {messages}\n\
         {content}\n\
         </section>\n",
        title = escape(title),
    ))
}

pub fn auth_form(submit: &str) -> String {
    format!(
        r#"<form method="post">
<label for="username">Username</label>
<input name="username" id="username" required>
<label for="password">Password</label>
<input type="password" name="password" id="password" required>
<input type="submit" value="{submit}">
</form>"#
    )
}

/// The create/edit form; `delete_id` adds the delete button for an existing post.
pub fn post_form(title: &str, body: &str, delete_id: Option<i64>) -> String {
    let mut form = format!(
        r#"<form method="post">
<label for="title">Title</label>
<input name="title" id="title" value="{}" required>
<label for="body">Body</label>
<textarea name="body" id="body">{}</textarea>
<input type="submit" value="Save">
</form>"#,
        escape(title),
        escape(body),
    );

    if let Some(id) = delete_id {
        form.push_str(&format!(
            r#"
<hr>
<form action="/{id}/delete" method="post">
<input class="danger" type="submit" value="Delete" onclick="return confirm('Are you sure?');">
</form>"#
        ));
    }

    form
}

pub fn index(posts: &[Post], user: Option<&User>) -> String {
    let mut out = String::new();

    if user.is_some() {
        out.push_str(r#"<a class="action" href="/create">New</a>"#);
        out.push('\n');
    }

    for post in posts {
        let edit = match user {
            Some(user) if user.id == post.author_id => {
                format!(r#"<a class="action" href="/{}/update">Edit</a>"#, post.id)
            }
            _ => String::new(),
        };

        out.push_str(&format!(
            r#"<article class="post">
<header><h1>{}</h1><div class="about">by {} on {}</div>{edit}</header>
<p class="body">{}</p>
</article>
"#,
            escape(&post.title),
            escape(&post.username),
            post.created,
            escape(&post.body),
        ));
    }

    out
}

#[cfg(test)]
mod test {
    use super::*;

    use warp::Reply;

    use crate::time::Timestamp;

    fn post(author_id: i64) -> Post {
        Post {
            id: 3,
            title: "<i>hi</i>".into(),
            body: "a & b".into(),
            created: Timestamp::from_i64(0),
            author_id,
            username: "alice".into(),
        }
    }

    #[test]
    fn escaping() {
        assert_eq!(
            escape(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn index_shows_edit_only_to_the_author() {
        let alice = User {
            id: 1,
            username: "alice".into(),
            password: String::new(),
        };
        let bob = User {
            id: 2,
            ..alice.clone()
        };
        let posts = [post(1)];

        let own = index(&posts, Some(&alice));
        assert!(own.contains(r#"href="/create""#));
        assert!(own.contains(r#"href="/3/update""#));
        assert!(own.contains("<h1>&lt;i&gt;hi&lt;/i&gt;</h1>"));
        assert!(own.contains("by alice on 1970-01-01"));
        assert!(own.contains("a &amp; b"));

        assert!(!index(&posts, Some(&bob)).contains("/3/update"));

        let anonymous = index(&posts, None);
        assert!(!anonymous.contains("/create"));
        assert!(!anonymous.contains("/3/update"));
    }

    #[test]
    fn every_flash_is_shown() {
        let page = render(
            "Log In",
            None,
            &["Incorrect username.".into(), "<again>".into()],
            "",
        );
        let body = page.into_response().into_body();
        let bytes = tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(warp::hyper::body::to_bytes(body))
            .unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();

        assert!(body.contains(r#"<div class="flash">Incorrect username.</div>"#));
        assert!(body.contains(r#"<div class="flash">&lt;again&gt;</div>"#));
    }

    #[test]
    fn delete_button_only_for_existing_posts() {
        assert!(!post_form("", "", None).contains("/delete"));
        assert!(post_form("t", "b", Some(9)).contains(r#"action="/9/delete""#));
    }
}
