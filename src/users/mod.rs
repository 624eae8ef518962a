pub mod forms;
pub mod ui;

use anyhow::Result;
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel::SqliteConnection;
use tracing::info;

use crate::security::password::PasswordManager;
use crate::shared::schema::{comments, sessions, users};

diesel::define_sql_function!(fn lower(x: Text) -> Text);

pub const USERNAME_MAX_LENGTH: usize = 150;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    pub id: i32,
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub date_joined: NaiveDateTime,
    pub last_login: Option<NaiveDateTime>,
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.username)
    }
}

/// Account details with the password still in clear text.
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub is_staff: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
struct NewUser<'a> {
    username: &'a str,
    password_hash: &'a str,
    email: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    is_staff: bool,
    is_active: bool,
    date_joined: NaiveDateTime,
}

pub fn find_by_id(conn: &mut SqliteConnection, id: i32) -> QueryResult<Option<User>> {
    users::table
        .find(id)
        .select(User::as_select())
        .first(conn)
        .optional()
}

/// Usernames are unique regardless of case, so lookups ignore case too.
pub fn find_by_username(conn: &mut SqliteConnection, username: &str) -> QueryResult<Option<User>> {
    users::table
        .filter(lower(users::username).eq(username.to_lowercase()))
        .select(User::as_select())
        .first(conn)
        .optional()
}

pub fn username_taken(conn: &mut SqliteConnection, username: &str) -> QueryResult<bool> {
    find_by_username(conn, username).map(|u| u.is_some())
}

pub fn create_user(
    conn: &mut SqliteConnection,
    passwords: &PasswordManager,
    account: &NewAccount,
) -> Result<User> {
    let password_hash = passwords.hash(&account.password)?;

    let user = diesel::insert_into(users::table)
        .values(NewUser {
            username: &account.username,
            password_hash: &password_hash,
            email: &account.email,
            first_name: &account.first_name,
            last_name: &account.last_name,
            is_staff: account.is_staff,
            is_active: true,
            date_joined: Utc::now().naive_utc(),
        })
        .returning(User::as_returning())
        .get_result(conn)?;

    info!("Created user {} (staff: {})", user.username, user.is_staff);
    Ok(user)
}

/// Removes a user. Their comments stay, attributed to nobody, and their
/// stored sessions go with them.
pub fn delete_user(conn: &mut SqliteConnection, id: i32) -> QueryResult<bool> {
    conn.transaction(|conn| {
        diesel::update(comments::table.filter(comments::author_id.eq(id)))
            .set(comments::author_id.eq(None::<i32>))
            .execute(conn)?;
        diesel::delete(sessions::table.filter(sessions::user_id.eq(id))).execute(conn)?;
        let deleted = diesel::delete(users::table.find(id)).execute(conn)?;
        Ok(deleted > 0)
    })
}

pub fn touch_last_login(conn: &mut SqliteConnection, id: i32) -> QueryResult<()> {
    diesel::update(users::table.find(id))
        .set(users::last_login.eq(Some(Utc::now().naive_utc())))
        .execute(conn)?;
    Ok(())
}

/// Checks credentials. Unknown usernames still pay for one hash so both
/// failure paths take about as long.
pub fn authenticate(
    conn: &mut SqliteConnection,
    passwords: &PasswordManager,
    username: &str,
    password: &str,
) -> Result<Option<User>> {
    let Some(user) = find_by_username(conn, username)? else {
        passwords.verify_dummy(password);
        return Ok(None);
    };

    if !passwords.verify(password, &user.password_hash)? || !user.is_active {
        return Ok(None);
    }

    Ok(Some(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::security::password::{Argon2Config, PasswordConfig};
    use crate::shared::utils::{create_pool, run_migrations, DbPool};
    use crate::tickets::model::{Severity, Status, TicketInput};
    use crate::tickets::store;

    fn setup() -> (DbPool, PasswordManager) {
        let pool = create_pool(&DatabaseConfig {
            url: ":memory:".to_string(),
            ..DatabaseConfig::default()
        })
        .expect("pool");
        run_migrations(&pool).expect("migrations");
        let passwords = PasswordManager::new(&Argon2Config::minimal(), PasswordConfig::default())
            .expect("password manager");
        (pool, passwords)
    }

    fn account(username: &str) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            password: "Tr1cky-Lemur-42".to_string(),
            ..NewAccount::default()
        }
    }

    #[test]
    fn test_create_and_authenticate() {
        let (pool, passwords) = setup();
        let mut conn = pool.get().expect("conn");
        let user = create_user(&mut conn, &passwords, &account("alice")).expect("create");

        assert!(user.password_hash.starts_with("$argon2id$"));
        assert!(user.is_active);

        let found = authenticate(&mut conn, &passwords, "alice", "Tr1cky-Lemur-42")
            .expect("authenticate");
        assert_eq!(found.map(|u| u.id), Some(user.id));

        let wrong = authenticate(&mut conn, &passwords, "alice", "nope").expect("authenticate");
        assert!(wrong.is_none());

        let unknown = authenticate(&mut conn, &passwords, "bob", "nope").expect("authenticate");
        assert!(unknown.is_none());
    }

    #[test]
    fn test_username_lookup_ignores_case() {
        let (pool, passwords) = setup();
        let mut conn = pool.get().expect("conn");
        create_user(&mut conn, &passwords, &account("Alice")).expect("create");

        assert!(username_taken(&mut conn, "alice").expect("lookup"));
        assert!(username_taken(&mut conn, "ALICE").expect("lookup"));
        assert!(!username_taken(&mut conn, "bob").expect("lookup"));
        assert!(create_user(&mut conn, &passwords, &account("aLiCe")).is_err());
    }

    #[test]
    fn test_inactive_user_cannot_authenticate() {
        let (pool, passwords) = setup();
        let mut conn = pool.get().expect("conn");
        let user = create_user(&mut conn, &passwords, &account("carol")).expect("create");
        diesel::update(users::table.find(user.id))
            .set(users::is_active.eq(false))
            .execute(&mut conn)
            .expect("deactivate");

        let result = authenticate(&mut conn, &passwords, "carol", "Tr1cky-Lemur-42")
            .expect("authenticate");
        assert!(result.is_none());
    }

    #[test]
    fn test_delete_user_keeps_comments() {
        let (pool, passwords) = setup();
        let mut conn = pool.get().expect("conn");
        let user = create_user(&mut conn, &passwords, &account("dave")).expect("create");
        let ticket = store::insert_ticket(
            &mut conn,
            &TicketInput {
                title: "t".into(),
                description: "d".into(),
                severity: Severity::Low,
                status: Status::Open,
            },
        )
        .expect("ticket");
        store::insert_comment(&mut conn, ticket.id, Some(user.id), "hello").expect("comment");

        assert!(delete_user(&mut conn, user.id).expect("delete"));
        assert!(find_by_id(&mut conn, user.id).expect("find").is_none());

        let comments = store::list_comments(&mut conn, &ticket).expect("comments");
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].comment.author_id, None);
        assert_eq!(comments[0].to_string(), format!("Comment by [deleted] on Ticket {}", ticket.id));
    }

    #[test]
    fn test_touch_last_login() {
        let (pool, passwords) = setup();
        let mut conn = pool.get().expect("conn");
        let user = create_user(&mut conn, &passwords, &account("erin")).expect("create");
        assert!(user.last_login.is_none());

        touch_last_login(&mut conn, user.id).expect("touch");
        let reloaded = find_by_id(&mut conn, user.id).expect("find").expect("exists");
        assert!(reloaded.last_login.is_some());
    }
}
