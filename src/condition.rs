//! Predicate fragments and `WHERE` clause composition.
//!
//! ```
//! use rust_sqlite::condition::{Condition, Where};
//!
//! let clause = Where::from(Condition::equal("name", "Josh")).and(Condition::equal("age", 55));
//! assert_eq!(clause.sql(), "WHERE name = ? AND age = ?");
//! assert_eq!(clause.to_string(), "WHERE name = 'Josh' AND age = 55");
//! ```

use std::fmt;

use crate::error::{Error, Result};
use crate::ident;
use crate::value::{format_value, Value};

/// Comparison operators for building predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl Operator {
    pub fn as_sql(self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "<>",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
        }
    }
}

/// Logical connectives placed between conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Logic {
    And,
    Or,
    Not,
}

impl Logic {
    pub fn as_sql(self) -> &'static str {
        match self {
            Logic::And => "AND",
            Logic::Or => "OR",
            Logic::Not => "NOT",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    IsNull,
    Compare(Operator, Value),
    Like(String),
    In(Vec<Value>),
    Between { low: Value, high: Value, negate: bool },
}

/// A single predicate on one column.
///
/// [`Condition::sql`] yields the fragment with `?` placeholders and
/// [`Condition::params`] the values to bind to them, in order. `Display`
/// renders the same fragment with the values inlined as literals.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    column: String,
    predicate: Predicate,
}

impl Condition {
    /// `key = value`, or `key IS NULL` when the value is null.
    pub fn equal(key: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        let predicate = if value.is_null() {
            Predicate::IsNull
        } else {
            Predicate::Compare(Operator::Equal, value)
        };
        Self {
            column: key.into(),
            predicate,
        }
    }

    pub fn compare(key: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Self {
            column: key.into(),
            predicate: Predicate::Compare(op, value.into()),
        }
    }

    /// `key LIKE pattern`; the caller supplies any `%` or `_` wildcards.
    pub fn like(key: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            column: key.into(),
            predicate: Predicate::Like(pattern.into()),
        }
    }

    pub fn in_set<I, V>(key: impl Into<String>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let column = key.into();
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(Error::invalid(format!("IN set for '{column}' is empty")));
        }
        Ok(Self {
            column,
            predicate: Predicate::In(values),
        })
    }

    pub fn between(
        key: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
        negate: bool,
    ) -> Self {
        Self {
            column: key.into(),
            predicate: Predicate::Between {
                low: low.into(),
                high: high.into(),
                negate,
            },
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn sql(&self) -> String {
        let key = &self.column;
        match &self.predicate {
            Predicate::IsNull => format!("{key} IS NULL"),
            Predicate::Compare(op, _) => format!("{key} {} ?", op.as_sql()),
            Predicate::Like(_) => format!("{key} LIKE ?"),
            Predicate::In(values) => {
                let marks = vec!["?"; values.len()].join(",");
                format!("{key} IN ({marks})")
            }
            Predicate::Between { negate, .. } => {
                format!("{key} {}BETWEEN ? AND ?", if *negate { "NOT " } else { "" })
            }
        }
    }

    pub fn params(&self) -> Vec<Value> {
        match &self.predicate {
            Predicate::IsNull => Vec::new(),
            Predicate::Compare(_, v) => vec![v.clone()],
            Predicate::Like(p) => vec![Value::Text(p.clone())],
            Predicate::In(values) => values.clone(),
            Predicate::Between { low, high, .. } => vec![low.clone(), high.clone()],
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = &self.column;
        match &self.predicate {
            Predicate::IsNull => write!(f, "{key} IS NULL"),
            Predicate::Compare(op, v) => write!(f, "{key} {} {}", op.as_sql(), format_value(v)),
            Predicate::Like(p) => write!(f, "{key} LIKE {}", format_value(&Value::Text(p.clone()))),
            Predicate::In(values) => {
                let list: Vec<String> = values.iter().map(format_value).collect();
                write!(f, "{key} IN ({})", list.join(","))
            }
            Predicate::Between { low, high, negate } => write!(
                f,
                "{key} {}BETWEEN {} AND {}",
                if *negate { "NOT " } else { "" },
                format_value(low),
                format_value(high)
            ),
        }
    }
}

/// One element of a `WHERE` clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Condition(Condition),
    Logic(Logic),
}

impl From<Condition> for Fragment {
    fn from(c: Condition) -> Self {
        Fragment::Condition(c)
    }
}

impl From<Logic> for Fragment {
    fn from(l: Logic) -> Self {
        Fragment::Logic(l)
    }
}

/// A non-empty `WHERE` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Where {
    fragments: Vec<Fragment>,
}

impl Where {
    /// Joins the fragments with single spaces behind a leading `WHERE`.
    ///
    /// Fails with [`Error::InvalidArgument`] when no fragment is given.
    pub fn new<I, F>(fragments: I) -> Result<Self>
    where
        I: IntoIterator<Item = F>,
        F: Into<Fragment>,
    {
        let fragments: Vec<Fragment> = fragments.into_iter().map(Into::into).collect();
        if fragments.is_empty() {
            return Err(Error::invalid("WHERE clause needs at least one fragment"));
        }
        Ok(Self { fragments })
    }

    pub fn push(mut self, fragment: impl Into<Fragment>) -> Self {
        self.fragments.push(fragment.into());
        self
    }

    pub fn and(self, condition: Condition) -> Self {
        self.push(Logic::And).push(condition)
    }

    pub fn or(self, condition: Condition) -> Self {
        self.push(Logic::Or).push(condition)
    }

    pub fn and_not(self, condition: Condition) -> Self {
        self.push(Logic::And).push(Logic::Not).push(condition)
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn sql(&self) -> String {
        let parts: Vec<String> = self
            .fragments
            .iter()
            .map(|f| match f {
                Fragment::Condition(c) => c.sql(),
                Fragment::Logic(l) => l.as_sql().to_string(),
            })
            .collect();
        format!("WHERE {}", parts.join(" "))
    }

    pub fn params(&self) -> Vec<Value> {
        self.conditions().flat_map(Condition::params).collect()
    }

    /// Every column referenced must pass the identifier allow-list.
    pub fn validate(&self) -> Result<()> {
        ident::validate_all(self.conditions().map(Condition::column))
    }

    fn conditions(&self) -> impl Iterator<Item = &Condition> {
        self.fragments.iter().filter_map(|f| match f {
            Fragment::Condition(c) => Some(c),
            Fragment::Logic(_) => None,
        })
    }
}

impl From<Condition> for Where {
    fn from(c: Condition) -> Self {
        Self {
            fragments: vec![Fragment::Condition(c)],
        }
    }
}

impl fmt::Display for Where {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WHERE")?;
        for fragment in &self.fragments {
            match fragment {
                Fragment::Condition(c) => write!(f, " {c}")?,
                Fragment::Logic(l) => write!(f, " {}", l.as_sql())?,
            }
        }
        Ok(())
    }
}
