use std::collections::BTreeMap;

use chrono::Utc;
use tracing::debug;

use crate::models::{Account, AccountId, Post, PostId, TokenStatus};
use crate::{Database, Result, StoreError};

impl Database {
    // -- Accounts --

    /// The email scan and the insert share one exclusive section, so two
    /// concurrent registrations for the same email cannot both succeed.
    pub fn create_account(&self, email: &str, password_hash: &str) -> Result<Account> {
        self.with_write(|tables| {
            if tables.accounts.values().any(|a| a.email == email) {
                return Err(StoreError::AlreadyExists(email.to_string()));
            }

            let account = Account {
                id: next_id(&tables.accounts),
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                is_upgraded: false,
            };
            tables.accounts.insert(account.id, account.clone());

            debug!(account_id = account.id, "account created");
            Ok(account)
        })
    }

    /// Replace email and password hash of an existing account.
    pub fn update_account(
        &self,
        id: AccountId,
        email: &str,
        password_hash: &str,
    ) -> Result<Account> {
        self.with_write(|tables| {
            if tables.accounts.values().any(|a| a.email == email && a.id != id) {
                return Err(StoreError::AlreadyExists(email.to_string()));
            }

            let account = tables
                .accounts
                .get_mut(&id)
                .ok_or(StoreError::NotFound("account"))?;
            account.email = email.to_string();
            account.password_hash = password_hash.to_string();

            debug!(account_id = id, "account updated");
            Ok(account.clone())
        })
    }

    pub fn upgrade_account(&self, id: AccountId) -> Result<Account> {
        self.with_write(|tables| {
            let account = tables
                .accounts
                .get_mut(&id)
                .ok_or(StoreError::NotFound("account"))?;
            account.is_upgraded = true;

            debug!(account_id = id, "account upgraded");
            Ok(account.clone())
        })
    }

    pub fn get_account_by_email(&self, email: &str) -> Result<Account> {
        self.with_read(|tables| {
            tables
                .accounts
                .values()
                .find(|a| a.email == email)
                .cloned()
                .ok_or(StoreError::NotFound("account"))
        })
    }

    pub fn get_account_by_id(&self, id: AccountId) -> Result<Account> {
        self.with_read(|tables| {
            tables
                .accounts
                .get(&id)
                .cloned()
                .ok_or(StoreError::NotFound("account"))
        })
    }

    pub fn account_count(&self) -> Result<usize> {
        self.with_read(|tables| Ok(tables.accounts.len()))
    }

    // -- Posts --

    /// The author must exist at creation time.
    pub fn create_post(&self, body: &str, author_id: AccountId) -> Result<Post> {
        self.with_write(|tables| {
            if !tables.accounts.contains_key(&author_id) {
                return Err(StoreError::NotFound("account"));
            }

            let post = Post {
                id: next_id(&tables.posts),
                body: body.to_string(),
                author_id,
            };
            tables.posts.insert(post.id, post.clone());

            debug!(post_id = post.id, author_id, "post created");
            Ok(post)
        })
    }

    pub fn get_post(&self, id: PostId) -> Result<Post> {
        self.with_read(|tables| {
            tables
                .posts
                .get(&id)
                .cloned()
                .ok_or(StoreError::NotFound("post"))
        })
    }

    /// All posts in storage order. Filtering and sorting belong to the caller.
    pub fn list_posts(&self) -> Result<Vec<Post>> {
        self.with_read(|tables| Ok(tables.posts.values().cloned().collect()))
    }

    pub fn delete_post(&self, id: PostId) -> Result<()> {
        self.with_write(|tables| {
            tables
                .posts
                .remove(&id)
                .ok_or(StoreError::NotFound("post"))?;

            debug!(post_id = id, "post deleted");
            Ok(())
        })
    }

    // -- Refresh tokens --

    /// Register a freshly issued refresh token as live. Re-adding a known
    /// token leaves its state untouched, so a revoked token stays revoked.
    pub fn add_refresh_token(&self, token: &str) -> Result<()> {
        self.with_write(|tables| {
            tables.revoked_tokens.entry(token.to_string()).or_insert(None);
            Ok(())
        })
    }

    /// `NotFound` means the token was never registered as a refresh token.
    pub fn check_token(&self, token: &str) -> Result<TokenStatus> {
        self.with_read(|tables| match tables.revoked_tokens.get(token) {
            None => Err(StoreError::NotFound("refresh token")),
            Some(None) => Ok(TokenStatus::Valid),
            Some(Some(at)) => Ok(TokenStatus::Revoked(*at)),
        })
    }

    /// Mark a registered token revoked. Revoking twice keeps the first instant.
    pub fn revoke_token(&self, token: &str) -> Result<()> {
        self.with_write(|tables| {
            let revoked_at = tables
                .revoked_tokens
                .get_mut(token)
                .ok_or(StoreError::NotFound("refresh token"))?;
            if revoked_at.is_none() {
                *revoked_at = Some(Utc::now());
                debug!("refresh token revoked");
            }
            Ok(())
        })
    }
}

/// Next id for a collection: one past the largest id in use. Equal to
/// `len + 1` while nothing has been deleted, and never reuses a live id.
fn next_id<V>(map: &BTreeMap<u64, V>) -> u64 {
    map.keys().next_back().map_or(1, |max| max + 1)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    use tempfile::TempDir;

    use super::*;
    use crate::models::Tables;

    fn open_temp() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::open(&dir.path().join("database.json")).unwrap();
        (dir, db)
    }

    #[test]
    fn open_initialises_empty_file() {
        let (dir, db) = open_temp();
        let path = dir.path().join("database.json");
        assert!(path.exists());

        let tables: Tables = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(tables, Tables::default());
        assert_eq!(db.account_count().unwrap(), 0);
        assert!(db.list_posts().unwrap().is_empty());
    }

    #[test]
    fn account_ids_follow_creation_order() {
        let (_dir, db) = open_temp();
        for (i, email) in ["a@x.com", "b@x.com", "c@x.com"].iter().enumerate() {
            let account = db.create_account(email, "hash").unwrap();
            assert_eq!(account.id, i as u64 + 1);
            assert!(!account.is_upgraded);
        }
    }

    #[test]
    fn duplicate_email_is_rejected_without_mutation() {
        let (_dir, db) = open_temp();
        db.create_account("a@x.com", "hash1").unwrap();

        let err = db.create_account("a@x.com", "hash2").unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(email) if email == "a@x.com"));
        assert_eq!(db.account_count().unwrap(), 1);
        assert_eq!(db.get_account_by_email("a@x.com").unwrap().password_hash, "hash1");
    }

    #[test]
    fn email_lookup_is_case_sensitive() {
        let (_dir, db) = open_temp();
        db.create_account("a@x.com", "hash").unwrap();
        assert!(matches!(
            db.get_account_by_email("A@X.COM"),
            Err(StoreError::NotFound(_))
        ));
        assert!(db.create_account("A@X.COM", "hash").is_ok());
    }

    #[test]
    fn update_rewrites_existing_account() {
        let (_dir, db) = open_temp();
        let account = db.create_account("a@x.com", "old").unwrap();

        let updated = db.update_account(account.id, "new@x.com", "new").unwrap();
        assert_eq!(updated.id, account.id);
        assert_eq!(db.get_account_by_id(account.id).unwrap().email, "new@x.com");
        assert!(matches!(
            db.get_account_by_email("a@x.com"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn update_missing_account_does_not_create_it() {
        let (_dir, db) = open_temp();
        assert!(matches!(
            db.update_account(7, "ghost@x.com", "hash"),
            Err(StoreError::NotFound("account"))
        ));
        assert_eq!(db.account_count().unwrap(), 0);
    }

    #[test]
    fn update_to_taken_email_is_rejected() {
        let (_dir, db) = open_temp();
        db.create_account("a@x.com", "hash").unwrap();
        let b = db.create_account("b@x.com", "hash").unwrap();

        assert!(matches!(
            db.update_account(b.id, "a@x.com", "hash"),
            Err(StoreError::AlreadyExists(_))
        ));
        // Keeping one's own email is fine.
        assert!(db.update_account(b.id, "b@x.com", "other").is_ok());
    }

    #[test]
    fn upgrade_sets_flag() {
        let (_dir, db) = open_temp();
        let account = db.create_account("a@x.com", "hash").unwrap();
        assert!(db.upgrade_account(account.id).unwrap().is_upgraded);
        assert!(db.get_account_by_id(account.id).unwrap().is_upgraded);
        assert!(matches!(db.upgrade_account(99), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn post_lifecycle() {
        let (_dir, db) = open_temp();
        let author = db.create_account("a@x.com", "hash").unwrap();

        let post = db.create_post("hello", author.id).unwrap();
        assert_eq!(post.id, 1);
        assert_eq!(db.get_post(1).unwrap(), post);

        db.delete_post(1).unwrap();
        assert!(matches!(db.get_post(1), Err(StoreError::NotFound("post"))));
        assert!(matches!(db.delete_post(1), Err(StoreError::NotFound("post"))));
    }

    #[test]
    fn post_requires_existing_author() {
        let (_dir, db) = open_temp();
        assert!(matches!(
            db.create_post("orphan", 1),
            Err(StoreError::NotFound("account"))
        ));
        assert!(db.list_posts().unwrap().is_empty());
    }

    #[test]
    fn deleted_post_ids_are_not_reused_while_live_ids_remain() {
        let (_dir, db) = open_temp();
        let author = db.create_account("a@x.com", "hash").unwrap();
        db.create_post("one", author.id).unwrap();
        db.create_post("two", author.id).unwrap();

        db.delete_post(1).unwrap();
        let third = db.create_post("three", author.id).unwrap();
        assert_eq!(third.id, 3);
        assert_eq!(db.get_post(2).unwrap().body, "two");
    }

    #[test]
    fn records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("database.json");

        let (accounts, posts) = {
            let db = Database::open(&path).unwrap();
            let a = db.create_account("a@x.com", "h1").unwrap();
            let b = db.create_account("b@x.com", "h2").unwrap();
            db.create_post("first", a.id).unwrap();
            db.create_post("second", b.id).unwrap();
            db.add_refresh_token("refresh-1").unwrap();
            db.revoke_token("refresh-1").unwrap();
            (vec![a, b], db.list_posts().unwrap())
        };

        let db = Database::open(&path).unwrap();
        for account in &accounts {
            assert_eq!(&db.get_account_by_id(account.id).unwrap(), account);
        }
        let mut reloaded = db.list_posts().unwrap();
        reloaded.sort_by_key(|p| p.id);
        assert_eq!(reloaded, posts);
        assert!(matches!(
            db.check_token("refresh-1").unwrap(),
            TokenStatus::Revoked(_)
        ));
    }

    #[test]
    fn refresh_token_states() {
        let (_dir, db) = open_temp();
        assert!(matches!(
            db.check_token("unknown"),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            db.revoke_token("unknown"),
            Err(StoreError::NotFound(_))
        ));

        db.add_refresh_token("t").unwrap();
        assert_eq!(db.check_token("t").unwrap(), TokenStatus::Valid);

        db.revoke_token("t").unwrap();
        let TokenStatus::Revoked(first) = db.check_token("t").unwrap() else {
            panic!("token should be revoked");
        };

        // Neither re-adding nor re-revoking brings it back or moves the instant.
        db.add_refresh_token("t").unwrap();
        db.revoke_token("t").unwrap();
        assert_eq!(db.check_token("t").unwrap(), TokenStatus::Revoked(first));
    }

    #[test]
    fn concurrent_registrations_get_distinct_ids() {
        let (_dir, db) = open_temp();
        let db = Arc::new(db);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let db = Arc::clone(&db);
                thread::spawn(move || db.create_account(&format!("user{i}@x.com"), "hash").unwrap().id)
            })
            .collect();

        let ids: HashSet<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(ids, (1..=16).collect::<HashSet<u64>>());
    }

    #[test]
    fn concurrent_duplicate_registration_admits_one() {
        let (_dir, db) = open_temp();
        let db = Arc::new(db);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = Arc::clone(&db);
                thread::spawn(move || db.create_account("same@x.com", "hash").is_ok())
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
        assert_eq!(db.account_count().unwrap(), 1);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let (dir, db) = open_temp();
        std::fs::write(dir.path().join("database.json"), b"{not json").unwrap();
        assert!(matches!(
            db.get_account_by_id(1),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn missing_file_is_recreated_on_write_only() {
        let (dir, db) = open_temp();
        db.create_account("a@x.com", "hash").unwrap();
        let path = dir.path().join("database.json");
        std::fs::remove_file(&path).unwrap();

        assert_eq!(db.account_count().unwrap(), 0);
        assert!(!path.exists());

        // A failing write still leaves an empty store on disk.
        assert!(matches!(db.delete_post(1), Err(StoreError::NotFound(_))));
        let tables: Tables = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(tables, Tables::default());
    }
}
