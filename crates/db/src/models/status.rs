//! Status helper enums mapping to SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data in the
//! corresponding `*_statuses` database table.

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Every variant, in seed order.
            pub const ALL: &'static [Self] = &[$( Self::$variant ),+];

            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Seeded `name` value of this status.
            pub fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => $label ),+
                }
            }

            /// Map a database status ID back to the enum.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( x if x == $val => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

define_status_enum! {
    /// Conversion job lifecycle status.
    ConversionStatus {
        Pending = 1 => "pending",
        Processing = 2 => "processing",
        Processed = 3 => "processed",
        Error = 4 => "error",
    }
}

impl ConversionStatus {
    /// Whether a job in this status may be claimed for a conversion attempt
    /// without waiting for a lease to expire.
    pub fn is_claimable(self) -> bool {
        matches!(self, Self::Pending | Self::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_status_ids_match_seed_data() {
        assert_eq!(ConversionStatus::Pending.id(), 1);
        assert_eq!(ConversionStatus::Processing.id(), 2);
        assert_eq!(ConversionStatus::Processed.id(), 3);
        assert_eq!(ConversionStatus::Error.id(), 4);
    }

    #[test]
    fn status_into_status_id() {
        let id: StatusId = ConversionStatus::Error.into();
        assert_eq!(id, 4);
    }

    #[test]
    fn from_id_round_trips() {
        for status in [
            ConversionStatus::Pending,
            ConversionStatus::Processing,
            ConversionStatus::Processed,
            ConversionStatus::Error,
        ] {
            assert_eq!(ConversionStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(ConversionStatus::from_id(0), None);
        assert_eq!(ConversionStatus::from_id(5), None);
    }

    #[test]
    fn only_pending_and_error_are_claimable() {
        let claimable: Vec<_> = ConversionStatus::ALL
            .iter()
            .copied()
            .filter(|s| s.is_claimable())
            .collect();
        assert_eq!(claimable, [ConversionStatus::Pending, ConversionStatus::Error]);
    }

    #[test]
    fn names_match_seed_data() {
        assert_eq!(ConversionStatus::Processing.to_string(), "processing");
        assert_eq!(ConversionStatus::Error.name(), "error");
    }
}
