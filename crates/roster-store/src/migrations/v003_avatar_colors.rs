//! Migration v003: remembered default avatar colors for contacts.

use rusqlite::Connection;

const UP_SQL: &str = r#"
ALTER TABLE contacts ADD COLUMN avatar_color INTEGER;   -- AvatarColor wire value
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
