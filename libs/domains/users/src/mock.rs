//! mockall double for [`UserDirectory`]

use crate::directory::UserDirectory;
use crate::error::DirectoryResult;
use crate::models::{User, UserId};
use async_trait::async_trait;
use mockall::mock;

mock! {
    pub UserDirectory {}

    #[async_trait]
    impl UserDirectory for UserDirectory {
        async fn get_by_id(&self, id: &UserId) -> DirectoryResult<Option<User>>;
    }
}
