//! Locator chains for element selection
//!
//! A locator is a chain of queries evaluated left to right, each narrowing
//! the previous result set. Root queries (`css`, `role`, `test_id`, `text`,
//! `text_exact`) search descendants; `has_text` and `nth` refine in place.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};

/// One query in a locator chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    /// CSS selector (e.g. `li`, `ul > li`)
    Css(String),

    /// ARIA role with optional accessible name
    Role {
        role: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default)]
        exact: bool,
    },

    /// `data-testid` attribute
    TestId(String),

    /// Case-insensitive substring text match
    Text(String),

    /// Whole-text exact match
    TextExact(String),

    /// Keep only elements whose text contains this string
    HasText(String),

    /// Keep only the n-th element (zero based)
    Nth(usize),
}

impl Query {
    /// Whether this query can start a chain
    pub fn is_root(&self) -> bool {
        !matches!(self, Query::HasText(_) | Query::Nth(_))
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Css(css) => write!(f, "css={}", css),
            Query::Role { role, name: Some(name), exact } => {
                write!(f, "role={}[name={:?}{}]", role, name, if *exact { " exact" } else { "" })
            }
            Query::Role { role, name: None, .. } => write!(f, "role={}", role),
            Query::TestId(id) => write!(f, "test_id={}", id),
            Query::Text(text) => write!(f, "text={:?}", text),
            Query::TextExact(text) => write!(f, "text_exact={:?}", text),
            Query::HasText(text) => write!(f, "has_text={:?}", text),
            Query::Nth(n) => write!(f, "nth={}", n),
        }
    }
}

/// A chain of queries resolving to zero or more elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator {
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    chain: Vec<Query>,
}

impl Locator {
    fn root(query: Query) -> Self {
        Self { chain: vec![query] }
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Self::root(Query::Css(selector.into()))
    }

    /// Any element with this role, e.g. `Locator::role("button")`
    pub fn role(role: impl Into<String>) -> Self {
        Self::root(Query::Role {
            role: role.into(),
            name: None,
            exact: false,
        })
    }

    /// A button by accessible name (substring, case-insensitive)
    pub fn button(name: impl Into<String>) -> Self {
        Self::role("button").named(name)
    }

    /// A button whose accessible name is exactly `name`
    pub fn button_exact(name: impl Into<String>) -> Self {
        Self::role("button").named_exact(name)
    }

    pub fn test_id(id: impl Into<String>) -> Self {
        Self::root(Query::TestId(id.into()))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::root(Query::Text(text.into()))
    }

    pub fn text_exact(text: impl Into<String>) -> Self {
        Self::root(Query::TextExact(text.into()))
    }

    /// Set the accessible name on a trailing role query.
    ///
    /// Has no effect when the last query is not a role query.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        if let Some(Query::Role { name: slot, exact, .. }) = self.chain.last_mut() {
            *slot = Some(name.into());
            *exact = false;
        }
        self
    }

    pub fn named_exact(mut self, name: impl Into<String>) -> Self {
        if let Some(Query::Role { name: slot, exact, .. }) = self.chain.last_mut() {
            *slot = Some(name.into());
            *exact = true;
        }
        self
    }

    /// Append a query searching inside the current matches
    pub fn within(mut self, query: Query) -> Self {
        self.chain.push(query);
        self
    }

    /// Buttons inside the current matches
    pub fn get_button(self, name: impl Into<String>) -> Self {
        self.within(Query::Role {
            role: "button".into(),
            name: Some(name.into()),
            exact: false,
        })
    }

    pub fn get_button_exact(self, name: impl Into<String>) -> Self {
        self.within(Query::Role {
            role: "button".into(),
            name: Some(name.into()),
            exact: true,
        })
    }

    pub fn get_role(self, role: impl Into<String>) -> Self {
        self.within(Query::Role {
            role: role.into(),
            name: None,
            exact: false,
        })
    }

    pub fn has_text(self, text: impl Into<String>) -> Self {
        self.within(Query::HasText(text.into()))
    }

    pub fn nth(self, index: usize) -> Self {
        self.within(Query::Nth(index))
    }

    pub fn first(self) -> Self {
        self.nth(0)
    }

    pub fn queries(&self) -> &[Query] {
        &self.chain
    }

    /// Reject chains that are empty or start with a refinement
    pub fn validate(&self) -> E2eResult<()> {
        match self.chain.first() {
            None => Err(E2eError::SpecParse("locator chain is empty".into())),
            Some(q) if !q.is_root() => Err(E2eError::SpecParse(format!(
                "locator cannot start with {}",
                q
            ))),
            Some(_) => Ok(()),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, query) in self.chain.iter().enumerate() {
            if i > 0 {
                f.write_str(" >> ")?;
            }
            write!(f, "{}", query)?;
        }
        Ok(())
    }
}
