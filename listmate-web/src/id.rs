use thiserror::Error;

/// Create a new ID type wrapping a database `SERIAL` column. The type serializes as a plain
/// integer, binds to SQL as `INTEGER`, and parses from path segments.
#[macro_export]
macro_rules! make_id {
    ($(#[$meta:meta])* $typ:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            serde::Serialize,
            serde::Deserialize,
            $crate::sqlx::Type,
        )]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $typ(pub i32);

        impl $typ {
            /// Return the inner integer
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl From<i32> for $typ {
            fn from(value: i32) -> Self {
                Self(value)
            }
        }

        impl std::fmt::Display for $typ {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $typ {
            type Err = $crate::id::IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<i32>()
                    .map(Self)
                    .map_err(|_| $crate::id::IdError)
            }
        }
    };
}

/// The error returned when an ID fails to parse
#[derive(Debug, Error)]
#[error("Failed to parse ID")]
pub struct IdError;
