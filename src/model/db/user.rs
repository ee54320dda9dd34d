use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::UserId,
    mongodb::{u32_id_filter, Coll},
};

/// Core user data.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCore {
    pub username: String,
    pub password_hash: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl UserCore {
    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        // A malformed hash can only come from outside this application;
        // treat it as a mismatch rather than trusting it.
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }
}

/// A user from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: UserId,
    #[serde(flatten)]
    pub user: UserCore,
}

impl User {
    /// Does a user with this ID exist?
    pub async fn exists(users: &Coll<User>, id: UserId) -> Result<bool, mongodb::error::Error> {
        let count = users.count_documents(u32_id_filter(id), None).await?;
        Ok(count > 0)
    }

    /// The usernames of the given users, in one query. Unknown IDs are absent.
    pub async fn usernames(
        users: &Coll<User>,
        ids: &[UserId],
    ) -> Result<HashMap<UserId, String>, mongodb::error::Error> {
        let mut cursor = users
            .find(doc! { "_id": { "$in": ids.to_vec() } }, None)
            .await?;
        let mut names = HashMap::with_capacity(ids.len());
        while let Some(user) = cursor.try_next().await? {
            names.insert(user.id, user.user.username);
        }
        Ok(names)
    }
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_password() {
        let user = User::example(1);
        assert!(user.verify_password("correct horse"));
        assert!(!user.verify_password("battery staple"));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        let mut user = User::example(1);
        user.password_hash = "not a hash".to_string();
        assert!(!user.verify_password("correct horse"));
    }

    #[backend_test]
    async fn user_exists(users: Coll<User>) {
        users.insert_one(User::example(3), None).await.unwrap();
        assert!(User::exists(&users, 3).await.unwrap());
        assert!(!User::exists(&users, 4).await.unwrap());
    }

    #[backend_test]
    async fn usernames_by_id(users: Coll<User>) {
        users
            .insert_many([User::example(1), User::example(2)], None)
            .await
            .unwrap();
        let names = User::usernames(&users, &[2, 7]).await.unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names[&2], "voter2");
    }
}
