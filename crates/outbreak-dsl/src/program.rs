//! Compiled scripts.
//!
//! The compiler lowers the AST into this form after resolving every name and
//! checking types, so the interpreter never sees an unknown identifier or an
//! ill-typed operation.

use crate::ast::{BinaryOp, Span};
use crate::value::{Ty, Value};

/// A participant field visible to scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// `sickness`, writable.
    Sickness,
    /// `infected`, writable.
    Infected,
    /// `healer`, writable.
    Healer,
    /// `masked`, writable.
    Masked,
    /// `immunocompromised`
    Immunocompromised,
    /// `is_dead`
    IsDead,
    /// `infectious`
    Infectious,
    /// `susceptible`
    Susceptible,
    /// `sickness_rate`, the effective contagiousness.
    SicknessRate,
}

impl Field {
    /// Resolve a script identifier.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "sickness" => Field::Sickness,
            "infected" => Field::Infected,
            "healer" => Field::Healer,
            "masked" => Field::Masked,
            "immunocompromised" => Field::Immunocompromised,
            "is_dead" => Field::IsDead,
            "infectious" => Field::Infectious,
            "susceptible" => Field::Susceptible,
            "sickness_rate" => Field::SicknessRate,
            _ => return None,
        })
    }

    /// Script spelling.
    pub fn name(self) -> &'static str {
        match self {
            Field::Sickness => "sickness",
            Field::Infected => "infected",
            Field::Healer => "healer",
            Field::Masked => "masked",
            Field::Immunocompromised => "immunocompromised",
            Field::IsDead => "is_dead",
            Field::Infectious => "infectious",
            Field::Susceptible => "susceptible",
            Field::SicknessRate => "sickness_rate",
        }
    }

    /// Static type of the field.
    pub fn ty(self) -> Ty {
        match self {
            Field::Sickness => Ty::Int,
            Field::SicknessRate => Ty::Float,
            _ => Ty::Bool,
        }
    }

    /// Only the four stored flags and sickness can be assigned.
    pub fn is_writable(self) -> bool {
        matches!(
            self,
            Field::Sickness | Field::Infected | Field::Healer | Field::Masked
        )
    }
}

/// A function callable from scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// `random()`, a float in `[0, 1)`.
    Random,
    /// `randint(low, high)`, inclusive.
    Randint,
    /// `min(a, b)`
    Min,
    /// `max(a, b)`
    Max,
    /// `add_sickness()` or `add_sickness(delta)`
    AddSickness,
    /// `infect()`
    Infect,
    /// `kill()`
    Kill,
    /// `cure()`
    Cure,
    /// `become_healer()`
    BecomeHealer,
    /// `ask_number(prompt)`
    AskNumber,
    /// `ask_confirm(prompt)`
    AskConfirm,
    /// `answered(reply)`
    Answered,
    /// `timed_out(reply)`
    TimedOut,
    /// `value_or(reply, default)`
    ValueOr,
    /// `broadcast(text)`
    Broadcast,
    /// `narrate(text)`
    Narrate,
}

impl Builtin {
    /// Resolve a call name.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "random" => Builtin::Random,
            "randint" => Builtin::Randint,
            "min" => Builtin::Min,
            "max" => Builtin::Max,
            "add_sickness" => Builtin::AddSickness,
            "infect" => Builtin::Infect,
            "kill" => Builtin::Kill,
            "cure" => Builtin::Cure,
            "become_healer" => Builtin::BecomeHealer,
            "ask_number" => Builtin::AskNumber,
            "ask_confirm" => Builtin::AskConfirm,
            "answered" => Builtin::Answered,
            "timed_out" => Builtin::TimedOut,
            "value_or" => Builtin::ValueOr,
            "broadcast" => Builtin::Broadcast,
            "narrate" => Builtin::Narrate,
            _ => return None,
        })
    }

    /// Script spelling.
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Random => "random",
            Builtin::Randint => "randint",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::AddSickness => "add_sickness",
            Builtin::Infect => "infect",
            Builtin::Kill => "kill",
            Builtin::Cure => "cure",
            Builtin::BecomeHealer => "become_healer",
            Builtin::AskNumber => "ask_number",
            Builtin::AskConfirm => "ask_confirm",
            Builtin::Answered => "answered",
            Builtin::TimedOut => "timed_out",
            Builtin::ValueOr => "value_or",
            Builtin::Broadcast => "broadcast",
            Builtin::Narrate => "narrate",
        }
    }

    /// Accepted argument counts, inclusive.
    pub fn arity(self) -> (usize, usize) {
        match self {
            Builtin::Random
            | Builtin::Infect
            | Builtin::Kill
            | Builtin::Cure
            | Builtin::BecomeHealer => (0, 0),
            Builtin::AddSickness => (0, 1),
            Builtin::AskNumber
            | Builtin::AskConfirm
            | Builtin::Answered
            | Builtin::TimedOut
            | Builtin::Broadcast
            | Builtin::Narrate => (1, 1),
            Builtin::Randint | Builtin::Min | Builtin::Max | Builtin::ValueOr => (2, 2),
        }
    }

    /// Pure builtins depend only on their arguments and may run in
    /// predicates.
    pub fn is_pure(self) -> bool {
        matches!(
            self,
            Builtin::Min | Builtin::Max | Builtin::Answered | Builtin::TimedOut | Builtin::ValueOr
        )
    }
}

/// A resolved expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal, including signal and reply literals.
    Const(Value),
    /// Read a local slot.
    Local(usize),
    /// Read a participant field.
    Field(Field),
    /// Boolean negation.
    Not(Box<Expr>),
    /// Numeric negation; the span reports overflow.
    Neg(Box<Expr>, Span),
    /// Infix operation.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
        /// Whole expression, for runtime errors.
        span: Span,
    },
    /// Builtin call with checked arity.
    Call {
        /// Which builtin.
        builtin: Builtin,
        /// Arguments in order.
        args: Vec<Expr>,
        /// Whole call, for runtime errors.
        span: Span,
    },
    /// Weighted random choice.
    Choose {
        /// Weight and outcome of each arm. Weights are finite and their sum
        /// is positive.
        arms: Vec<(f64, Expr)>,
        /// Whole expression, for runtime errors.
        span: Span,
    },
}

/// A resolved statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Write a local slot (`let` or reassignment).
    SetLocal(usize, Expr),
    /// Write a participant field.
    SetField(Field, Expr),
    /// Conditional chain.
    If {
        /// Condition and body, tried in order.
        branches: Vec<(Expr, Vec<Stmt>)>,
        /// Runs when no branch matched; may be empty.
        otherwise: Vec<Stmt>,
    },
    /// Stop with an optional signal.
    Return(Option<Expr>),
    /// Evaluate for side effects.
    Eval(Expr),
}

/// A compiled item effect.
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub(crate) body: Vec<Stmt>,
    pub(crate) locals: usize,
}

impl Effect {
    /// The effect that does nothing.
    pub fn noop() -> Self {
        Self {
            body: Vec::new(),
            locals: 0,
        }
    }

    /// Whether running this effect can prompt for input.
    pub fn asks_for_input(&self) -> bool {
        fn in_expr(e: &Expr) -> bool {
            match e {
                Expr::Call { builtin, args, .. } => {
                    matches!(builtin, Builtin::AskNumber | Builtin::AskConfirm)
                        || args.iter().any(in_expr)
                }
                Expr::Not(e) | Expr::Neg(e, _) => in_expr(e),
                Expr::Binary { lhs, rhs, .. } => in_expr(lhs) || in_expr(rhs),
                Expr::Choose { arms, .. } => arms.iter().any(|(_, e)| in_expr(e)),
                Expr::Const(_) | Expr::Local(_) | Expr::Field(_) => false,
            }
        }
        fn in_stmts(stmts: &[Stmt]) -> bool {
            stmts.iter().any(|s| match s {
                Stmt::SetLocal(_, e) | Stmt::SetField(_, e) | Stmt::Eval(e) => in_expr(e),
                Stmt::Return(e) => e.as_ref().is_some_and(in_expr),
                Stmt::If {
                    branches,
                    otherwise,
                } => {
                    branches
                        .iter()
                        .any(|(c, body)| in_expr(c) || in_stmts(body))
                        || in_stmts(otherwise)
                }
            })
        }
        in_stmts(&self.body)
    }
}

/// A compiled eligibility predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub(crate) expr: Expr,
}

impl Predicate {
    /// The predicate that always holds.
    pub fn always() -> Self {
        Self {
            expr: Expr::Const(Value::Bool(true)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_round_trip() {
        for field in [
            Field::Sickness,
            Field::Infected,
            Field::Healer,
            Field::Masked,
            Field::Immunocompromised,
            Field::IsDead,
            Field::Infectious,
            Field::Susceptible,
            Field::SicknessRate,
        ] {
            assert_eq!(Field::from_name(field.name()), Some(field));
        }
    }

    #[test]
    fn only_state_flags_are_writable() {
        assert!(Field::Sickness.is_writable());
        assert!(Field::Masked.is_writable());
        assert!(!Field::IsDead.is_writable());
        assert!(!Field::SicknessRate.is_writable());
    }

    #[test]
    fn randomness_and_mutation_are_impure() {
        assert!(!Builtin::Random.is_pure());
        assert!(!Builtin::AddSickness.is_pure());
        assert!(!Builtin::AskConfirm.is_pure());
        assert!(Builtin::Max.is_pure());
    }
}
