use thiserror::Error;

#[derive(Debug, Error)]
#[error("Unknown value {0}")]
pub struct UnknownValue(pub String);

/// Define an enum that maps to a Postgres enum type of the same variant names.
macro_rules! db_enum {
    ($(#[$meta:meta])* $name:ident, $type_name:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            serde::Serialize,
            serde::Deserialize,
            sqlx::Type,
        )]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        #[sqlx(type_name = $type_name, rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// The name used in the database and in JSON
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::models::UnknownValue;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err($crate::models::UnknownValue(s.to_string())),
                }
            }
        }
    };
}

pub mod access_request;
pub mod todo;
pub mod todo_list;
pub mod user;
