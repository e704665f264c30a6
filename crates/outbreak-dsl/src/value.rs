use std::fmt;

use outbreak_core::Signal;

/// Static type of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ty {
    /// No value (`broadcast`, `narrate`).
    Unit,
    /// 64-bit integer.
    Int,
    /// 64-bit float.
    Float,
    /// Boolean.
    Bool,
    /// String.
    Str,
    /// A [`Signal`] literal.
    Signal,
    /// Result of `ask_number`.
    NumberReply,
    /// Result of `ask_confirm`.
    ConfirmReply,
    /// `timeout` / `invalid`; comparable with either reply type.
    ReplyLiteral,
    /// Produced after an error, to suppress follow-on diagnostics.
    Unknown,
}

impl Ty {
    /// Int, float, or unknown.
    pub fn is_numeric(self) -> bool {
        matches!(self, Ty::Int | Ty::Float | Ty::Unknown)
    }

    /// Any reply type, or unknown.
    pub fn is_reply(self) -> bool {
        matches!(
            self,
            Ty::NumberReply | Ty::ConfirmReply | Ty::ReplyLiteral | Ty::Unknown
        )
    }

    /// Whether a value of type `other` may be stored where `self` is expected.
    pub fn accepts(self, other: Ty) -> bool {
        self == other || self == Ty::Unknown || other == Ty::Unknown || (self == Ty::Float && other == Ty::Int)
    }

    /// Result type of arithmetic on two numeric operands.
    pub fn promote(self, other: Ty) -> Ty {
        match (self, other) {
            (Ty::Unknown, _) | (_, Ty::Unknown) => Ty::Unknown,
            (Ty::Int, Ty::Int) => Ty::Int,
            _ => Ty::Float,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Ty::Unit => "nothing",
            Ty::Int => "int",
            Ty::Float => "float",
            Ty::Bool => "bool",
            Ty::Str => "string",
            Ty::Signal => "signal",
            Ty::NumberReply => "number reply",
            Ty::ConfirmReply => "confirm reply",
            Ty::ReplyLiteral => "reply",
            Ty::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// What kind of answer an input request wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskKind {
    /// An integer.
    Number,
    /// Yes or no.
    Confirm,
}

impl AskKind {
    /// Interpret raw text typed by the participant.
    pub fn parse(self, text: &str) -> Reply {
        let text = text.trim();
        match self {
            AskKind::Number => text
                .parse::<i64>()
                .map(|n| Reply::Answered(Answer::Number(n)))
                .unwrap_or(Reply::Invalid),
            AskKind::Confirm => match text.to_ascii_lowercase().as_str() {
                "y" | "yes" | "true" | "confirm" => Reply::Answered(Answer::Confirm(true)),
                "n" | "no" | "false" | "cancel" => Reply::Answered(Answer::Confirm(false)),
                _ => Reply::Invalid,
            },
        }
    }
}

/// A parsed answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    /// Answer to `ask_number`.
    Number(i64),
    /// Answer to `ask_confirm`.
    Confirm(bool),
}

/// Outcome of an input request. The three cases are always kept apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// The participant answered with something parseable.
    Answered(Answer),
    /// The participant answered with something else.
    Invalid,
    /// No answer before the input timeout.
    TimedOut,
}

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Returned by calls with nothing to return.
    Unit,
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// String.
    Str(String),
    /// Signal, produced by literals and mutating builtins.
    Signal(Signal),
    /// Outcome of an `ask_*` call.
    Reply(Reply),
}

impl Value {
    /// `Some` for a [`Value::Bool`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// `Some` for a [`Value::Int`] only; floats are not truncated.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric view, widening ints.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// `Some` for a [`Value::Str`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// `Some` for a [`Value::Signal`].
    pub fn as_signal(&self) -> Option<Signal> {
        match self {
            Value::Signal(s) => Some(*s),
            _ => None,
        }
    }

    /// `Some` for a [`Value::Reply`].
    pub fn as_reply(&self) -> Option<Reply> {
        match self {
            Value::Reply(r) => Some(*r),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => Ok(()),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => f.write_str(s),
            Value::Signal(s) => write!(f, "{s}"),
            Value::Reply(Reply::Answered(Answer::Number(n))) => write!(f, "{n}"),
            Value::Reply(Reply::Answered(Answer::Confirm(b))) => write!(f, "{b}"),
            Value::Reply(Reply::Invalid) => f.write_str("invalid"),
            Value::Reply(Reply::TimedOut) => f.write_str("timeout"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_replies() {
        assert_eq!(AskKind::Number.parse(" 42 "), Reply::Answered(Answer::Number(42)));
        assert_eq!(AskKind::Number.parse("-3"), Reply::Answered(Answer::Number(-3)));
        assert_eq!(AskKind::Number.parse("lots"), Reply::Invalid);
    }

    #[test]
    fn confirm_replies() {
        assert_eq!(AskKind::Confirm.parse("YES"), Reply::Answered(Answer::Confirm(true)));
        assert_eq!(AskKind::Confirm.parse("n"), Reply::Answered(Answer::Confirm(false)));
        assert_eq!(AskKind::Confirm.parse("maybe"), Reply::Invalid);
    }

    #[test]
    fn float_accepts_int_but_not_reverse() {
        assert!(Ty::Float.accepts(Ty::Int));
        assert!(!Ty::Int.accepts(Ty::Float));
        assert!(Ty::Int.accepts(Ty::Unknown));
        assert_eq!(Ty::Int.promote(Ty::Float), Ty::Float);
    }

    #[test]
    fn display_concatenation_forms() {
        assert_eq!(Value::Float(0.5).to_string(), "0.5");
        assert_eq!(Value::Signal(Signal::Cured).to_string(), "cured");
        assert_eq!(Value::Reply(Reply::TimedOut).to_string(), "timeout");
    }
}
