//! Deep-link tokens
//!
//! A token names one pending request: `<prefix>_<user id>`, where the prefix
//! comes from the category table (`doctor_42`, `psychologist_42`).

use miette::Diagnostic;
use thiserror::Error;

use crate::category::{CategoryTable, RequestCategory};
use crate::id::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeepLinkToken {
    pub category: RequestCategory,
    pub user_id: UserId,
}

#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Malformed deep-link token '{token}'")]
    #[diagnostic(
        code(carebridge_core::malformed_token),
        help("Tokens look like <prefix>_<user id>, e.g. doctor_42")
    )]
    Malformed { token: String },

    #[error("Unknown deep-link prefix '{prefix}'")]
    #[diagnostic(code(carebridge_core::unknown_token_prefix))]
    UnknownPrefix { prefix: String },
}

impl DeepLinkToken {
    pub fn new(category: RequestCategory, user_id: UserId) -> Self {
        Self { category, user_id }
    }

    /// Render with the prefix configured for the token's category
    pub fn encode(&self, table: &CategoryTable) -> String {
        format!(
            "{}_{}",
            table.route(self.category).token_prefix,
            self.user_id
        )
    }

    pub fn parse(token: &str, table: &CategoryTable) -> Result<Self, TokenError> {
        let token = token.trim();
        let malformed = || TokenError::Malformed {
            token: token.to_string(),
        };

        // Prefixes may contain underscores, the id never does
        let (prefix, id) = token.rsplit_once('_').ok_or_else(malformed)?;
        let user_id = id.parse::<UserId>().map_err(|_| malformed())?;
        let category =
            table
                .category_for_prefix(prefix)
                .ok_or_else(|| TokenError::UnknownPrefix {
                    prefix: prefix.to_string(),
                })?;

        Ok(Self { category, user_id })
    }
}
