/// Local account row (local backend only).
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub display_name: String,
    /// Argon2 PHC string; carries its own salt and parameters.
    pub password_hash: String,
    pub created_at: i64,
}
