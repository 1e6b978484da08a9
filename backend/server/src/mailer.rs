use async_trait::async_trait;
use tracing::info;

use crate::{database::Database, error::AppError, models::User, utils::random_password};

pub const ACTIVATION_SUBJECT: &str = "Your new dribdat account";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingMail {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), AppError>;
}

/// Writes messages to the log instead of delivering them.
#[derive(Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), AppError> {
        info!(
            to = %mail.recipients.join(", "),
            subject = %mail.subject,
            body = %mail.body,
            "mail sent"
        );
        Ok(())
    }
}

pub fn activation_mail(user: &User, base_url: &str, act_hash: &str) -> OutgoingMail {
    let base_url = base_url.trim_end_matches('/');
    OutgoingMail {
        recipients: vec![user.email.clone()],
        subject: ACTIVATION_SUBJECT.to_string(),
        body: format!(
            "Thanks for signing up to dribdat at {base_url}/\n\n\
             Tap here to activate your account:\n\n{base_url}/activate/{act_hash}"
        ),
    }
}

/// Stores a fresh activation hash on the user and mails them the link.
/// Returns the hash.
pub async fn user_activation(
    db: &Database,
    mailer: &dyn Mailer,
    user_id: i64,
    base_url: &str,
) -> Result<String, AppError> {
    let act_hash = random_password(24);

    let user = db
        .with_conn(|conn| {
            let mut user = User::get(conn, user_id)?.ok_or(AppError::NotFound)?;
            user.activation_hash = Some(act_hash.clone());
            user.save(conn)?;
            Ok(user)
        })
        .await?;

    mailer.send(activation_mail(&user, base_url, &act_hash)).await?;
    Ok(act_hash)
}
