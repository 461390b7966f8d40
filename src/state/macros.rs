//! Macros for declaring state enums.

/// Generate a state enum and its [`State`](crate::state::State) implementation.
///
/// Each variant is paired with the name stored in history rows; serde uses
/// the same name.
///
/// # Example
///
/// ```
/// use concernkit::state::State;
/// use concernkit::state_enum;
///
/// state_enum! {
///     pub enum OrderState {
///         Pending => "pending",
///         InReview => "in_review",
///         Shipped => "shipped",
///     }
/// }
///
/// assert_eq!(OrderState::InReview.name(), "in_review");
/// ```
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident => $label:literal
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                #[serde(rename = $label)]
                $variant
            ),*
        }

        impl $crate::state::State for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => $label),*
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::state::State;

    state_enum! {
        enum TestState {
            Draft => "draft",
            InReview => "in_review",
            Published => "published",
        }
    }

    #[test]
    fn state_enum_generates_trait() {
        assert_eq!(TestState::Draft.name(), "draft");
        assert_eq!(TestState::InReview.name(), "in_review");
        assert_eq!(TestState::Published.name(), "published");
    }

    #[test]
    fn names_match_serialized_form() {
        let json = serde_json::to_string(&TestState::InReview).unwrap();
        assert_eq!(json, "\"in_review\"");
    }

    #[test]
    fn state_enum_supports_visibility() {
        state_enum! {
            pub enum PublicState {
                A => "a",
                B => "b",
            }
        }

        assert_eq!(PublicState::B.name(), "b");
    }
}
