//! Mapping from raw buzzer tokens (single characters) to teams.

use std::collections::HashMap;

use thiserror::Error;

use crate::state::game::TeamColor;

/// Latin layout first, Cyrillic layout second; the first token of each entry is the primary one.
const STANDARD_LAYOUT: [(TeamColor, &[char]); 6] = [
    (TeamColor::Red, &['r', 'к']),
    (TeamColor::Green, &['g', 'п']),
    (TeamColor::Blue, &['b', 'и']),
    (TeamColor::White, &['w', 'ц']),
    (TeamColor::Yellow, &['y', 'н']),
    (TeamColor::Pink, &['p', 'з']),
];

/// Errors detected while building a token table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenTableError {
    #[error("token `{token}` is bound to both `{first}` and `{second}`")]
    DuplicateToken {
        token: char,
        first: TeamColor,
        second: TeamColor,
    },
    #[error("team `{0}` is listed more than once")]
    DuplicateTeam(TeamColor),
    #[error("team `{0}` has no token")]
    MissingTeam(TeamColor),
}

/// Bijective-per-team lookup of tokens. Every team owns at least one token and
/// no token resolves to two teams.
#[derive(Debug, Clone)]
pub struct TokenTable {
    by_token: HashMap<char, TeamColor>,
    primary: HashMap<TeamColor, char>,
}

impl TokenTable {
    /// Table covering the Latin and Ukrainian keyboard layouts.
    pub fn standard() -> Result<Self, TokenTableError> {
        Self::new(STANDARD_LAYOUT)
    }

    /// Build a table from `(team, tokens)` entries, validating it at construction.
    pub fn new<'a, I>(entries: I) -> Result<Self, TokenTableError>
    where
        I: IntoIterator<Item = (TeamColor, &'a [char])>,
    {
        let mut by_token = HashMap::new();
        let mut primary = HashMap::new();

        for (team, tokens) in entries {
            if primary.contains_key(&team) {
                return Err(TokenTableError::DuplicateTeam(team));
            }
            let Some(first) = tokens.first().copied().map(fold_case) else {
                return Err(TokenTableError::MissingTeam(team));
            };
            primary.insert(team, first);

            for token in tokens.iter().copied().map(fold_case) {
                match by_token.insert(token, team) {
                    Some(previous) if previous != team => {
                        return Err(TokenTableError::DuplicateToken {
                            token,
                            first: previous,
                            second: team,
                        });
                    }
                    _ => {}
                }
            }
        }

        if let Some(missing) = TeamColor::ALL
            .into_iter()
            .find(|team| !primary.contains_key(team))
        {
            return Err(TokenTableError::MissingTeam(missing));
        }

        Ok(Self { by_token, primary })
    }

    /// Resolve a raw token. Only single-character input (after trimming) can match.
    pub fn resolve(&self, raw: &str) -> Option<TeamColor> {
        let mut chars = raw.trim().chars();
        let token = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        self.by_token.get(&fold_case(token)).copied()
    }

    /// Token used when a remote gateway reports a team by its color name.
    pub fn primary_token(&self, team: TeamColor) -> Option<char> {
        self.primary.get(&team).copied()
    }
}

fn fold_case(token: char) -> char {
    let mut lower = token.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(single), None) => single,
        _ => token,
    }
}
