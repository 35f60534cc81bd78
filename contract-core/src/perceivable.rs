//! Observable values
//!
//! A [`Perceivable`] is an immutable expression tree that produces a value
//! when evaluated against an [`Environment`]. The type parameter records
//! what the expression yields; constructors only build well-typed trees.
//!
//! # Evaluation semantics
//!
//! - Variables must be bound by the environment; the declared initial value
//!   is never used as a fallback.
//! - Decimal arithmetic is checked: overflow and division by zero are errors.
//! - Evaluation is strict: both operands of `and`/`or` are always evaluated,
//!   so an unbound variable is reported regardless of the other operand.
//! - Time conditions compare the environment's UTC calendar date.

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::marker::PhantomData;
use std::ops;

/// Name reported when the environment carries no time
pub const TIME_VARIABLE: &str = "$time";

/// Kind of an observable value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValueKind {
    /// Fixed-point decimal
    Decimal,
    /// Boolean
    Bool,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Decimal => write!(f, "decimal"),
            ValueKind::Bool => write!(f, "bool"),
        }
    }
}

/// Observable value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
    /// Decimal value
    Decimal(#[serde(serialize_with = "serialize_normalized")] Decimal),
    /// Boolean value
    Bool(bool),
}

impl Value {
    /// Kind of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Decimal(_) => ValueKind::Decimal,
            Value::Bool(_) => ValueKind::Bool,
        }
    }
}

// equal decimals of different scale must encode identically
fn serialize_normalized<S: Serializer>(value: &Decimal, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    Serialize::serialize(&value.normalize(), serializer)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Types a perceivable can produce
pub trait Observable: Copy + fmt::Debug {
    /// Kind tag
    const KIND: ValueKind;

    /// Wrap into a value
    fn into_value(self) -> Value;

    /// Unwrap from a value of the same kind
    fn from_value(value: &Value) -> Option<Self>;
}

impl Observable for Decimal {
    const KIND: ValueKind = ValueKind::Decimal;

    fn into_value(self) -> Value {
        Value::Decimal(self.normalize())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }
}

impl Observable for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn into_value(self) -> Value {
        Value::Bool(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Bindings a perceivable is evaluated against
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    bindings: BTreeMap<String, Value>,
    time: Option<DateTime<Utc>>,
}

impl Environment {
    /// Empty environment without a time
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the evaluation time
    pub fn at(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    /// Add a binding
    pub fn with(mut self, name: impl Into<String>, value: impl Observable) -> Self {
        self.bind(name, value);
        self
    }

    /// Add a binding in place
    pub fn bind(&mut self, name: impl Into<String>, value: impl Observable) {
        self.bindings.insert(name.into(), value.into_value());
    }

    /// Add a raw value binding in place
    pub fn bind_value(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// Look up a binding
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    /// Evaluation time
    pub fn time(&self) -> Option<DateTime<Utc>> {
        self.time
    }
}

/// Decimal comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Comparison {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

impl Comparison {
    fn holds<T: Ord>(self, left: &T, right: &T) -> bool {
        match self {
            Comparison::Lt => left < right,
            Comparison::Le => left <= right,
            Comparison::Gt => left > right,
            Comparison::Ge => left >= right,
            Comparison::Eq => left == right,
            Comparison::Ne => left != right,
        }
    }
}

/// Relation between the evaluation date and a reference date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeRelation {
    /// Evaluation date strictly before the reference
    Before,
    /// Evaluation date strictly after the reference
    After,
}

/// Date a time condition refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DateRef {
    /// Concrete calendar date
    Fixed(NaiveDate),
    /// Start of the enclosing roll-out period
    PeriodStart,
    /// End of the enclosing roll-out period
    PeriodEnd,
}

impl From<NaiveDate> for DateRef {
    fn from(date: NaiveDate) -> Self {
        DateRef::Fixed(date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
enum Expr {
    Const(Value),
    Variable { name: String, initial: Value },
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Min(Box<Expr>, Box<Expr>),
    Max(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        op: Comparison,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Time {
        relation: TimeRelation,
        date: DateRef,
    },
}

impl Expr {
    fn evaluate(&self, env: &Environment) -> Result<Value> {
        match self {
            Expr::Const(value) => Ok(*value),
            Expr::Variable { name, initial } => {
                let bound = env.get(name).ok_or_else(|| Error::UnboundVariable {
                    name: name.clone(),
                })?;
                if bound.kind() != initial.kind() {
                    return Err(Error::TypeMismatch {
                        expected: initial.kind(),
                        found: bound.kind(),
                    });
                }
                Ok(*bound)
            }
            Expr::Add(l, r) => arithmetic(l, r, env, "addition", Decimal::checked_add),
            Expr::Sub(l, r) => arithmetic(l, r, env, "subtraction", Decimal::checked_sub),
            Expr::Mul(l, r) => arithmetic(l, r, env, "multiplication", Decimal::checked_mul),
            Expr::Div(l, r) => {
                let divisor = decimal(r, env)?;
                if divisor.is_zero() {
                    return Err(Error::DivisionByZero);
                }
                let dividend = decimal(l, env)?;
                dividend
                    .checked_div(divisor)
                    .map(Value::Decimal)
                    .ok_or(Error::ArithmeticOverflow { operation: "division" })
            }
            Expr::Min(l, r) => Ok(Value::Decimal(decimal(l, env)?.min(decimal(r, env)?))),
            Expr::Max(l, r) => Ok(Value::Decimal(decimal(l, env)?.max(decimal(r, env)?))),
            Expr::Neg(e) => Ok(Value::Decimal(-decimal(e, env)?)),
            Expr::Not(e) => Ok(Value::Bool(!boolean(e, env)?)),
            Expr::And(l, r) => {
                let left = boolean(l, env)?;
                let right = boolean(r, env)?;
                Ok(Value::Bool(left && right))
            }
            Expr::Or(l, r) => {
                let left = boolean(l, env)?;
                let right = boolean(r, env)?;
                Ok(Value::Bool(left || right))
            }
            Expr::Compare { op, left, right } => {
                let left = decimal(left, env)?;
                let right = decimal(right, env)?;
                Ok(Value::Bool(op.holds(&left, &right)))
            }
            Expr::Time { relation, date } => {
                let now = env.time().ok_or_else(|| Error::UnboundVariable {
                    name: TIME_VARIABLE.to_string(),
                })?;
                let reference = match date {
                    DateRef::Fixed(date) => *date,
                    DateRef::PeriodStart | DateRef::PeriodEnd => {
                        return Err(Error::UnresolvedPeriodDate)
                    }
                };
                let today = now.date_naive();
                Ok(Value::Bool(match relation {
                    TimeRelation::Before => today < reference,
                    TimeRelation::After => today > reference,
                }))
            }
        }
    }

    fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Const(_) | Expr::Variable { .. } | Expr::Time { .. } => vec![],
            Expr::Neg(e) | Expr::Not(e) => vec![&**e],
            Expr::Add(l, r)
            | Expr::Sub(l, r)
            | Expr::Mul(l, r)
            | Expr::Div(l, r)
            | Expr::Min(l, r)
            | Expr::Max(l, r)
            | Expr::And(l, r)
            | Expr::Or(l, r)
            | Expr::Compare {
                left: l, right: r, ..
            } => vec![&**l, &**r],
        }
    }

    fn collect_variables<'a>(&'a self, names: &mut BTreeSet<&'a str>) {
        if let Expr::Variable { name, .. } = self {
            names.insert(name.as_str());
        }
        for child in self.children() {
            child.collect_variables(names);
        }
    }

    fn mentions_period_dates(&self) -> bool {
        match self {
            Expr::Time { date, .. } => !matches!(date, DateRef::Fixed(_)),
            other => other.children().iter().any(|c| c.mentions_period_dates()),
        }
    }

    fn resolve_period(&self, start: NaiveDate, end: NaiveDate) -> Expr {
        let map = |e: &Expr| Box::new(e.resolve_period(start, end));
        match self {
            Expr::Const(_) | Expr::Variable { .. } => self.clone(),
            Expr::Add(l, r) => Expr::Add(map(l), map(r)),
            Expr::Sub(l, r) => Expr::Sub(map(l), map(r)),
            Expr::Mul(l, r) => Expr::Mul(map(l), map(r)),
            Expr::Div(l, r) => Expr::Div(map(l), map(r)),
            Expr::Min(l, r) => Expr::Min(map(l), map(r)),
            Expr::Max(l, r) => Expr::Max(map(l), map(r)),
            Expr::Neg(e) => Expr::Neg(map(e)),
            Expr::Not(e) => Expr::Not(map(e)),
            Expr::And(l, r) => Expr::And(map(l), map(r)),
            Expr::Or(l, r) => Expr::Or(map(l), map(r)),
            Expr::Compare { op, left, right } => Expr::Compare {
                op: *op,
                left: map(left),
                right: map(right),
            },
            Expr::Time { relation, date } => Expr::Time {
                relation: *relation,
                date: match date {
                    DateRef::Fixed(d) => DateRef::Fixed(*d),
                    DateRef::PeriodStart => DateRef::Fixed(start),
                    DateRef::PeriodEnd => DateRef::Fixed(end),
                },
            },
        }
    }
}

fn decimal(expr: &Expr, env: &Environment) -> Result<Decimal> {
    let value = expr.evaluate(env)?;
    Decimal::from_value(&value).ok_or(Error::TypeMismatch {
        expected: ValueKind::Decimal,
        found: value.kind(),
    })
}

fn boolean(expr: &Expr, env: &Environment) -> Result<bool> {
    let value = expr.evaluate(env)?;
    bool::from_value(&value).ok_or(Error::TypeMismatch {
        expected: ValueKind::Bool,
        found: value.kind(),
    })
}

fn arithmetic(
    left: &Expr,
    right: &Expr,
    env: &Environment,
    operation: &'static str,
    op: fn(Decimal, Decimal) -> Option<Decimal>,
) -> Result<Value> {
    let left = decimal(left, env)?;
    let right = decimal(right, env)?;
    op(left, right)
        .map(Value::Decimal)
        .ok_or(Error::ArithmeticOverflow { operation })
}

/// Immutable expression yielding a `T`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Perceivable<T> {
    expr: Expr,
    #[serde(skip)]
    marker: PhantomData<T>,
}

impl<T> Perceivable<T> {
    fn wrap(expr: Expr) -> Self {
        Self {
            expr,
            marker: PhantomData,
        }
    }

    /// Names of every variable the expression reads
    pub fn variables(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.expr.collect_variables(&mut names);
        names
    }

    /// True for a literal constant
    pub fn is_constant(&self) -> bool {
        matches!(self.expr, Expr::Const(_))
    }

    /// True if the expression still refers to roll-out period dates
    pub fn mentions_period_dates(&self) -> bool {
        self.expr.mentions_period_dates()
    }

    pub(crate) fn resolve_period(&self, start: NaiveDate, end: NaiveDate) -> Self {
        Self::wrap(self.expr.resolve_period(start, end))
    }
}

impl<T: Observable> Perceivable<T> {
    /// Constant expression
    pub fn constant(value: T) -> Self {
        Self::wrap(Expr::Const(value.into_value()))
    }

    /// Named variable, to be bound by the environment
    pub fn variable(name: impl Into<String>, initial: T) -> Self {
        Self::wrap(Expr::Variable {
            name: name.into(),
            initial: initial.into_value(),
        })
    }

    /// Evaluate against an environment
    pub fn evaluate(&self, env: &Environment) -> Result<T> {
        let value = self.expr.evaluate(env)?;
        T::from_value(&value).ok_or(Error::TypeMismatch {
            expected: T::KIND,
            found: value.kind(),
        })
    }
}

impl Perceivable<Decimal> {
    fn binary(self, other: Self, build: fn(Box<Expr>, Box<Expr>) -> Expr) -> Self {
        Self::wrap(build(Box::new(self.expr), Box::new(other.expr)))
    }

    fn compare(self, op: Comparison, other: Self) -> Perceivable<bool> {
        Perceivable::wrap(Expr::Compare {
            op,
            left: Box::new(self.expr),
            right: Box::new(other.expr),
        })
    }

    /// Smaller of two values
    pub fn min(self, other: impl Into<Self>) -> Self {
        self.binary(other.into(), Expr::Min)
    }

    /// Larger of two values
    pub fn max(self, other: impl Into<Self>) -> Self {
        self.binary(other.into(), Expr::Max)
    }

    /// `self < other`
    pub fn lt(self, other: impl Into<Self>) -> Perceivable<bool> {
        self.compare(Comparison::Lt, other.into())
    }

    /// `self <= other`
    pub fn le(self, other: impl Into<Self>) -> Perceivable<bool> {
        self.compare(Comparison::Le, other.into())
    }

    /// `self > other`
    pub fn gt(self, other: impl Into<Self>) -> Perceivable<bool> {
        self.compare(Comparison::Gt, other.into())
    }

    /// `self >= other`
    pub fn ge(self, other: impl Into<Self>) -> Perceivable<bool> {
        self.compare(Comparison::Ge, other.into())
    }

    /// `self == other`
    pub fn eq_to(self, other: impl Into<Self>) -> Perceivable<bool> {
        self.compare(Comparison::Eq, other.into())
    }

    /// `self != other`
    pub fn ne_to(self, other: impl Into<Self>) -> Perceivable<bool> {
        self.compare(Comparison::Ne, other.into())
    }
}

impl Perceivable<bool> {
    /// Logical conjunction
    pub fn and(self, other: impl Into<Self>) -> Self {
        Self::wrap(Expr::And(Box::new(self.expr), Box::new(other.into().expr)))
    }

    /// Logical disjunction
    pub fn or(self, other: impl Into<Self>) -> Self {
        Self::wrap(Expr::Or(Box::new(self.expr), Box::new(other.into().expr)))
    }

    /// Holds while the evaluation date is strictly before `date`
    pub fn before(date: impl Into<DateRef>) -> Self {
        Self::wrap(Expr::Time {
            relation: TimeRelation::Before,
            date: date.into(),
        })
    }

    /// Holds once the evaluation date is strictly after `date`
    pub fn after(date: impl Into<DateRef>) -> Self {
        Self::wrap(Expr::Time {
            relation: TimeRelation::After,
            date: date.into(),
        })
    }
}

impl From<Decimal> for Perceivable<Decimal> {
    fn from(value: Decimal) -> Self {
        Perceivable::constant(value)
    }
}

impl From<bool> for Perceivable<bool> {
    fn from(value: bool) -> Self {
        Perceivable::constant(value)
    }
}

impl<R: Into<Perceivable<Decimal>>> ops::Add<R> for Perceivable<Decimal> {
    type Output = Perceivable<Decimal>;

    fn add(self, rhs: R) -> Self::Output {
        self.binary(rhs.into(), Expr::Add)
    }
}

impl<R: Into<Perceivable<Decimal>>> ops::Sub<R> for Perceivable<Decimal> {
    type Output = Perceivable<Decimal>;

    fn sub(self, rhs: R) -> Self::Output {
        self.binary(rhs.into(), Expr::Sub)
    }
}

impl<R: Into<Perceivable<Decimal>>> ops::Mul<R> for Perceivable<Decimal> {
    type Output = Perceivable<Decimal>;

    fn mul(self, rhs: R) -> Self::Output {
        self.binary(rhs.into(), Expr::Mul)
    }
}

impl<R: Into<Perceivable<Decimal>>> ops::Div<R> for Perceivable<Decimal> {
    type Output = Perceivable<Decimal>;

    fn div(self, rhs: R) -> Self::Output {
        self.binary(rhs.into(), Expr::Div)
    }
}

impl ops::Neg for Perceivable<Decimal> {
    type Output = Perceivable<Decimal>;

    fn neg(self) -> Self::Output {
        Self::wrap(Expr::Neg(Box::new(self.expr)))
    }
}

impl ops::Not for Perceivable<bool> {
    type Output = Perceivable<bool>;

    fn not(self) -> Self::Output {
        Self::wrap(Expr::Not(Box::new(self.expr)))
    }
}

/// Constant perceivable
pub fn constant<T: Observable>(value: T) -> Perceivable<T> {
    Perceivable::constant(value)
}

/// Variable perceivable
pub fn variable<T: Observable>(name: impl Into<String>, initial: T) -> Perceivable<T> {
    Perceivable::variable(name, initial)
}

/// Time condition: strictly before `date`
pub fn before(date: impl Into<DateRef>) -> Perceivable<bool> {
    Perceivable::before(date)
}

/// Time condition: strictly after `date`
pub fn after(date: impl Into<DateRef>) -> Perceivable<bool> {
    Perceivable::after(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_constant_evaluates_without_bindings() {
        let env = Environment::new();
        assert_eq!(constant(dec!(12.5)).evaluate(&env).unwrap(), dec!(12.5));
        assert!(constant(true).evaluate(&env).unwrap());
    }

    #[test]
    fn test_variable_requires_binding() {
        let rate = variable("libor", dec!(0.01));

        let err = rate.evaluate(&Environment::new()).unwrap_err();
        assert!(matches!(err, Error::UnboundVariable { ref name } if name == "libor"));

        let env = Environment::new().with("libor", dec!(0.035));
        assert_eq!(rate.evaluate(&env).unwrap(), dec!(0.035));
    }

    #[test]
    fn test_variable_kind_is_checked() {
        let rate = variable("libor", dec!(0.01));
        let env = Environment::new().with("libor", true);
        assert!(matches!(
            rate.evaluate(&env),
            Err(Error::TypeMismatch {
                expected: ValueKind::Decimal,
                found: ValueKind::Bool
            })
        ));
    }

    #[test]
    fn test_arithmetic_and_comparison() {
        let notional = constant(dec!(1000));
        let rate = variable("rate", dec!(0));
        let interest = notional * rate.clone() + dec!(5);

        let env = Environment::new().with("rate", dec!(0.02));
        assert_eq!(interest.clone().evaluate(&env).unwrap(), dec!(25));
        assert!(interest.clone().gt(dec!(20)).evaluate(&env).unwrap());
        assert!(!interest.le(dec!(20)).evaluate(&env).unwrap());
        assert_eq!(
            constant(dec!(3)).min(dec!(2)).max(dec!(2.5)).evaluate(&env).unwrap(),
            dec!(2.5)
        );
        assert_eq!((-rate).evaluate(&env).unwrap(), dec!(-0.02));
    }

    #[test]
    fn test_division_by_zero_is_an_error() {
        let expr = constant(dec!(1)) / dec!(0);
        assert!(matches!(expr.evaluate(&Environment::new()), Err(Error::DivisionByZero)));
    }

    #[test]
    fn test_overflow_is_an_error() {
        let expr = constant(Decimal::MAX) + Decimal::MAX;
        assert!(matches!(
            expr.evaluate(&Environment::new()),
            Err(Error::ArithmeticOverflow { operation: "addition" })
        ));
    }

    #[test]
    fn test_boolean_evaluation_is_strict() {
        let cond = constant(false).and(variable("knocked_out", false));
        assert!(matches!(
            cond.evaluate(&Environment::new()),
            Err(Error::UnboundVariable { .. })
        ));

        let cond = !constant(false).or(constant(false));
        assert!(cond.evaluate(&Environment::new()).unwrap());
    }

    #[test]
    fn test_time_conditions() {
        let maturity = date(2026, 6, 30);
        let env = Environment::new().at(Utc.with_ymd_and_hms(2026, 7, 1, 9, 0, 0).unwrap());

        assert!(after(maturity).evaluate(&env).unwrap());
        assert!(!before(maturity).evaluate(&env).unwrap());
        assert!(matches!(
            after(maturity).evaluate(&Environment::new()),
            Err(Error::UnboundVariable { ref name }) if name == TIME_VARIABLE
        ));
    }

    #[test]
    fn test_period_dates_resolve() {
        let cond = before(DateRef::PeriodEnd);
        assert!(cond.mentions_period_dates());

        let env = Environment::new().at(Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap());
        assert!(matches!(cond.evaluate(&env), Err(Error::UnresolvedPeriodDate)));

        let resolved = cond.resolve_period(date(2026, 1, 1), date(2026, 2, 1));
        assert!(!resolved.mentions_period_dates());
        assert!(resolved.evaluate(&env).unwrap());
    }

    #[test]
    fn test_variables_are_listed() {
        let expr = variable("a", dec!(0)) * variable("b", dec!(0)) + variable("a", dec!(1));
        let names: Vec<_> = expr.variables().into_iter().collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(!expr.is_constant());
    }

    #[test]
    fn test_structural_equality() {
        let a = variable("x", dec!(1)).gt(dec!(2));
        let b = variable("x", dec!(1)).gt(dec!(2));
        let c = variable("x", dec!(1)).ge(dec!(2));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
