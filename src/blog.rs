use std::fmt;

use log::{info, warn};

use crate::flaskr::{self, Flaskr};
use crate::post::{Post, PostForm};
use crate::time::Timestamp;
use crate::user::User;

#[derive(Debug, PartialEq, Eq)]
pub enum BlogError {
    TitleRequired,
    Failed(flaskr::Error),
}

impl fmt::Display for BlogError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TitleRequired => write!(fmt, "Title is required."),
            Self::Failed(e) => write!(fmt, "{e}"),
        }
    }
}

impl From<flaskr::Error> for BlogError {
    fn from(e: flaskr::Error) -> Self {
        Self::Failed(e)
    }
}

impl PostForm {
    fn validate(&self) -> Result<(), BlogError> {
        if self.title.is_empty() {
            Err(BlogError::TitleRequired)
        } else {
            Ok(())
        }
    }
}

impl Flaskr {
    pub async fn posts(&self) -> flaskr::Result<Vec<Post>> {
        self.backend()
            .posts()
            .await
            .map_err(|()| flaskr::Error::Internal)
    }

    /// Fetch a post, optionally insisting that `author` wrote it.
    pub async fn get_post(&self, id: i64, author: Option<&User>) -> flaskr::Result<Post> {
        let post = self
            .backend()
            .find_post(id)
            .await
            .map_err(|()| flaskr::Error::Internal)?
            .ok_or(flaskr::Error::PostNotFound(id))?;

        match author {
            Some(user) if user.id != post.author_id => {
                warn!(
                    "{} tried to modify post #{id} owned by {}",
                    user.username, post.username
                );
                Err(flaskr::Error::Forbidden)
            }
            _ => Ok(post),
        }
    }

    pub async fn create_post(&self, author: &User, form: &PostForm) -> Result<i64, BlogError> {
        form.validate()?;

        let id = self
            .backend()
            .insert_post(author.id, &form.title, &form.body, Timestamp::now())
            .await
            .map_err(|()| flaskr::Error::Internal)?;

        info!("{} created post #{id}", author.username);
        Ok(id)
    }

    pub async fn update_post(
        &self,
        id: i64,
        author: &User,
        form: &PostForm,
    ) -> Result<(), BlogError> {
        self.get_post(id, Some(author)).await?;
        form.validate()?;

        self.backend()
            .update_post(id, &form.title, &form.body)
            .await
            .map_err(|()| flaskr::Error::Internal)?;

        info!("{} updated post #{id}", author.username);
        Ok(())
    }

    pub async fn delete_post(&self, id: i64, author: &User) -> flaskr::Result<()> {
        self.get_post(id, Some(author)).await?;

        self.backend()
            .delete_post(id)
            .await
            .map_err(|()| flaskr::Error::Internal)?;

        info!("{} deleted post #{id}", author.username);
        Ok(())
    }
}
