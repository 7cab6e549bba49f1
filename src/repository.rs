use crate::models::{AdminLink, CreateLinkRequest, Link, UpdateLinkRequest, User, UserCredentials, UserRole};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations, allowing
/// the handlers to interact with the data layer without knowing the concrete
/// implementation (Postgres in production, the in-memory mock in tests).
///
/// Ownership-gated mutations are single conditional statements
/// (`WHERE id = ... AND user_id = ...`): "does not exist" and "exists but
/// not mine" are indistinguishable in the return value, and there is no
/// read-then-write window between the ownership check and the mutation.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Links ---
    /// All links owned by the user, newest first.
    async fn get_my_links(&self, user_id: Uuid) -> Result<Vec<Link>, sqlx::Error>;
    async fn create_link(&self, req: CreateLinkRequest, user_id: Uuid) -> Result<Link, sqlx::Error>;
    /// Owner-scoped single fetch. `None` covers both missing and foreign ids.
    async fn get_link(&self, id: Uuid, user_id: Uuid) -> Result<Option<Link>, sqlx::Error>;
    /// Owner-only conditional update. `None` when no row matched.
    async fn update_link(
        &self,
        id: Uuid,
        user_id: Uuid,
        req: UpdateLinkRequest,
    ) -> Result<Option<Link>, sqlx::Error>;
    /// Admin override: updates any link by id, no ownership check.
    async fn update_link_admin(
        &self,
        id: Uuid,
        req: UpdateLinkRequest,
    ) -> Result<Option<Link>, sqlx::Error>;
    /// Owner-only conditional delete. `false` when no row matched.
    async fn delete_link(&self, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error>;
    /// Admin access: every link in the system joined with its owner.
    async fn get_all_links(&self) -> Result<Vec<AdminLink>, sqlx::Error>;

    // --- Users ---
    /// Profile lookup for the auth extractor. Errors are swallowed into
    /// `None` because the only caller treats both identically (401).
    async fn get_user(&self, id: Uuid) -> Option<User>;
    async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, sqlx::Error>;
    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, sqlx::Error>;
    async fn mark_email_verified(&self, id: Uuid) -> Result<bool, sqlx::Error>;
    async fn get_users(&self) -> Result<Vec<User>, sqlx::Error>;
    async fn update_user_role(
        &self,
        id: Uuid,
        role: UserRole,
    ) -> Result<Option<User>, sqlx::Error>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

const LINK_COLUMNS: &str = "id, user_id, title, url, description, created_at, updated_at";

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the
/// PostgreSQL connection pool.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_my_links(&self, user_id: Uuid) -> Result<Vec<Link>, sqlx::Error> {
        sqlx::query_as::<_, Link>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn create_link(&self, req: CreateLinkRequest, user_id: Uuid) -> Result<Link, sqlx::Error> {
        sqlx::query_as::<_, Link>(&format!(
            "INSERT INTO links (id, user_id, title, url, description, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, NOW(), NOW()) \
             RETURNING {LINK_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(req.title)
        .bind(req.url)
        .bind(req.description)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_link(&self, id: Uuid, user_id: Uuid) -> Result<Option<Link>, sqlx::Error> {
        sqlx::query_as::<_, Link>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn update_link(
        &self,
        id: Uuid,
        user_id: Uuid,
        req: UpdateLinkRequest,
    ) -> Result<Option<Link>, sqlx::Error> {
        sqlx::query_as::<_, Link>(&format!(
            "UPDATE links SET title = $3, url = $4, description = $5, updated_at = clock_timestamp() \
             WHERE id = $1 AND user_id = $2 \
             RETURNING {LINK_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(req.title)
        .bind(req.url)
        .bind(req.description)
        .fetch_optional(&self.pool)
        .await
    }

    async fn update_link_admin(
        &self,
        id: Uuid,
        req: UpdateLinkRequest,
    ) -> Result<Option<Link>, sqlx::Error> {
        sqlx::query_as::<_, Link>(&format!(
            "UPDATE links SET title = $2, url = $3, description = $4, updated_at = clock_timestamp() \
             WHERE id = $1 \
             RETURNING {LINK_COLUMNS}"
        ))
        .bind(id)
        .bind(req.title)
        .bind(req.url)
        .bind(req.description)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_link(&self, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM links WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_all_links(&self) -> Result<Vec<AdminLink>, sqlx::Error> {
        sqlx::query_as::<_, AdminLink>(
            "SELECT l.id, l.user_id, l.title, l.url, l.description, \
                    l.created_at, l.updated_at, \
                    u.name AS user_name, u.email AS user_email \
             FROM links l \
             JOIN users u ON l.user_id = u.id \
             ORDER BY l.created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn get_user(&self, id: Uuid) -> Option<User> {
        sqlx::query_as::<_, User>("SELECT id, name, email, role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_user error: {:?}", e);
                None
            })
    }

    async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (id, name, email, role, password_hash) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, name, email, role",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .bind(UserRole::User)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, sqlx::Error> {
        sqlx::query_as::<_, UserCredentials>(
            "SELECT id, name, email, role, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    async fn mark_email_verified(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET email_verified = TRUE, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_users(&self) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT id, name, email, role FROM users ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await
    }

    async fn update_user_role(
        &self,
        id: Uuid,
        role: UserRole,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING id, name, email, role",
        )
        .bind(id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await
    }
}

// --- Mock Implementation (For Tests) ---

#[derive(Debug, Clone)]
struct MockUser {
    user: User,
    password_hash: String,
    email_verified: bool,
    created_at: chrono::DateTime<Utc>,
}

/// MockRepository
///
/// An in-memory implementation of `Repository` used by the integration
/// tests. It mirrors the conditional-mutation semantics of the SQL layer
/// (owner-scoped updates and deletes affect zero rows for foreign ids) so
/// handler behavior can be exercised without a database.
#[derive(Default)]
pub struct MockRepository {
    users: Mutex<HashMap<Uuid, MockUser>>,
    links: Mutex<HashMap<Uuid, Link>>,
}

impl MockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a user with a fixed id and a throwaway password hash.
    pub fn seed_user(&self, id: Uuid, name: &str, email: &str, role: UserRole) -> User {
        let user = User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            role,
        };
        self.users.lock().unwrap().insert(
            id,
            MockUser {
                user: user.clone(),
                password_hash: "unusable".to_string(),
                email_verified: false,
                created_at: Utc::now(),
            },
        );
        user
    }

    /// Inserts a user with a real Argon2 hash so the login flow can be
    /// exercised end to end.
    pub fn seed_user_with_password(
        &self,
        id: Uuid,
        name: &str,
        email: &str,
        role: UserRole,
        password_hash: &str,
    ) -> User {
        let user = self.seed_user(id, name, email, role);
        self.users.lock().unwrap().get_mut(&id).unwrap().password_hash =
            password_hash.to_string();
        user
    }

    pub fn email_verified(&self, id: Uuid) -> Option<bool> {
        self.users.lock().unwrap().get(&id).map(|u| u.email_verified)
    }
}

#[async_trait]
impl Repository for MockRepository {
    async fn get_my_links(&self, user_id: Uuid) -> Result<Vec<Link>, sqlx::Error> {
        let mut links: Vec<Link> = self
            .links
            .lock()
            .unwrap()
            .values()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(links)
    }

    async fn create_link(&self, req: CreateLinkRequest, user_id: Uuid) -> Result<Link, sqlx::Error> {
        let now = Utc::now();
        let link = Link {
            id: Uuid::new_v4(),
            user_id,
            title: req.title,
            url: req.url,
            description: req.description,
            created_at: now,
            updated_at: now,
        };
        self.links.lock().unwrap().insert(link.id, link.clone());
        Ok(link)
    }

    async fn get_link(&self, id: Uuid, user_id: Uuid) -> Result<Option<Link>, sqlx::Error> {
        Ok(self
            .links
            .lock()
            .unwrap()
            .get(&id)
            .filter(|l| l.user_id == user_id)
            .cloned())
    }

    async fn update_link(
        &self,
        id: Uuid,
        user_id: Uuid,
        req: UpdateLinkRequest,
    ) -> Result<Option<Link>, sqlx::Error> {
        let mut links = self.links.lock().unwrap();
        match links.get_mut(&id).filter(|l| l.user_id == user_id) {
            Some(link) => {
                link.title = req.title;
                link.url = req.url;
                link.description = req.description;
                link.updated_at = Utc::now();
                Ok(Some(link.clone()))
            }
            None => Ok(None),
        }
    }

    async fn update_link_admin(
        &self,
        id: Uuid,
        req: UpdateLinkRequest,
    ) -> Result<Option<Link>, sqlx::Error> {
        let mut links = self.links.lock().unwrap();
        match links.get_mut(&id) {
            Some(link) => {
                link.title = req.title;
                link.url = req.url;
                link.description = req.description;
                link.updated_at = Utc::now();
                Ok(Some(link.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_link(&self, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let mut links = self.links.lock().unwrap();
        let owned = links.get(&id).is_some_and(|l| l.user_id == user_id);
        if owned {
            links.remove(&id);
        }
        Ok(owned)
    }

    async fn get_all_links(&self) -> Result<Vec<AdminLink>, sqlx::Error> {
        let users = self.users.lock().unwrap();
        let mut links: Vec<AdminLink> = self
            .links
            .lock()
            .unwrap()
            .values()
            .filter_map(|l| {
                users.get(&l.user_id).map(|owner| AdminLink {
                    id: l.id,
                    user_id: l.user_id,
                    title: l.title.clone(),
                    url: l.url.clone(),
                    description: l.description.clone(),
                    created_at: l.created_at,
                    updated_at: l.updated_at,
                    user_name: owner.user.name.clone(),
                    user_email: owner.user.email.clone(),
                })
            })
            .collect();
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(links)
    }

    async fn get_user(&self, id: Uuid) -> Option<User> {
        self.users.lock().unwrap().get(&id).map(|u| u.user.clone())
    }

    async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, sqlx::Error> {
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            role: UserRole::User,
        };
        self.users.lock().unwrap().insert(
            user.id,
            MockUser {
                user: user.clone(),
                password_hash: password_hash.to_string(),
                email_verified: false,
                created_at: Utc::now(),
            },
        );
        Ok(user)
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, sqlx::Error> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.user.email == email)
            .map(|u| UserCredentials {
                id: u.user.id,
                name: u.user.name.clone(),
                email: u.user.email.clone(),
                role: u.user.role,
                password_hash: u.password_hash.clone(),
            }))
    }

    async fn mark_email_verified(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let mut users = self.users.lock().unwrap();
        match users.get_mut(&id) {
            Some(u) => {
                u.email_verified = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_users(&self) -> Result<Vec<User>, sqlx::Error> {
        let users = self.users.lock().unwrap();
        let mut records: Vec<&MockUser> = users.values().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records.into_iter().map(|u| u.user.clone()).collect())
    }

    async fn update_user_role(
        &self,
        id: Uuid,
        role: UserRole,
    ) -> Result<Option<User>, sqlx::Error> {
        let mut users = self.users.lock().unwrap();
        match users.get_mut(&id) {
            Some(u) => {
                u.user.role = role;
                Ok(Some(u.user.clone()))
            }
            None => Ok(None),
        }
    }
}
