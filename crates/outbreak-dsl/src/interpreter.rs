//! Tree-walking evaluation of compiled scripts.
//!
//! Effects are async because `ask_*`, `broadcast` and `narrate` reach out to
//! a [`Host`]. Predicates are pure and evaluate synchronously.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outbreak_core::{Participant, Signal, sickness_rate};
use rand::Rng;
use rand::rngs::StdRng;

use crate::ast::{BinaryOp, Span};
use crate::error::{EffectError, EffectResult};
use crate::program::{Builtin, Effect, Expr, Field, Predicate, Stmt};
use crate::value::{Answer, AskKind, Reply, Value};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Side effects an effect script may request.
#[async_trait]
pub trait Host: Send {
    /// Prompt the participant and wait for a reply.
    async fn ask(&mut self, prompt: &str, kind: AskKind) -> Reply;

    /// Post to the venue the item was used in.
    async fn broadcast(&mut self, text: &str);

    /// Emit a narrative announcement.
    async fn narrate(&mut self, text: &str);
}

/// Pick an index with probability proportional to its weight.
/// Returns `None` when no weight is positive or the weights overflow.
pub fn pick_weighted<R: Rng + ?Sized>(rng: &mut R, weights: &[f64]) -> Option<usize> {
    let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
    if !total.is_finite() || total <= 0.0 {
        return None;
    }
    let mut roll = rng.random_range(0.0..total);
    let mut last = None;
    for (index, weight) in weights.iter().enumerate() {
        if !weight.is_finite() || *weight <= 0.0 {
            continue;
        }
        if roll < *weight {
            return Some(index);
        }
        roll -= weight;
        last = Some(index);
    }
    // Float rounding can leave `roll` a hair above the final weight.
    last
}

impl Effect {
    /// Run the effect against `participant`, returning the signal it
    /// produced (`alive` when the script does not return one).
    ///
    /// On error the participant may be partially modified; callers run
    /// effects against a copy.
    pub async fn run(
        &self,
        participant: &mut Participant,
        rng: &mut StdRng,
        host: &mut dyn Host,
        now: DateTime<Utc>,
    ) -> EffectResult<Signal> {
        let mut machine = Machine {
            participant,
            rng,
            host,
            now,
            locals: vec![Value::Unit; self.locals],
        };
        match machine.exec_block(&self.body).await? {
            Flow::Return(Some(value)) => value.as_signal().ok_or_else(|| EffectError::Type {
                message: format!("effect returned `{value}` instead of a signal"),
            }),
            Flow::Return(None) | Flow::Next => Ok(Signal::Alive),
        }
    }
}

impl Predicate {
    /// Evaluate against a participant.
    pub fn evaluate(&self, participant: &Participant) -> EffectResult<bool> {
        let value = eval_pure(&self.expr, participant)?;
        value.as_bool().ok_or_else(|| EffectError::Type {
            message: format!("predicate produced `{value}`"),
        })
    }
}

enum Flow {
    Next,
    Return(Option<Value>),
}

struct Machine<'a> {
    participant: &'a mut Participant,
    rng: &'a mut StdRng,
    host: &'a mut dyn Host,
    now: DateTime<Utc>,
    locals: Vec<Value>,
}

impl<'a> Machine<'a> {
    fn exec_block<'s>(&'s mut self, stmts: &'s [Stmt]) -> BoxFuture<'s, EffectResult<Flow>> {
        Box::pin(async move {
            for stmt in stmts {
                if let Flow::Return(value) = self.exec(stmt).await? {
                    return Ok(Flow::Return(value));
                }
            }
            Ok(Flow::Next)
        })
    }

    async fn exec(&mut self, stmt: &Stmt) -> EffectResult<Flow> {
        match stmt {
            Stmt::SetLocal(slot, expr) => {
                let value = self.eval(expr).await?;
                if let Some(local) = self.locals.get_mut(*slot) {
                    *local = value;
                }
            }
            Stmt::SetField(field, expr) => {
                let value = self.eval(expr).await?;
                self.set_field(*field, value)?;
            }
            Stmt::If {
                branches,
                otherwise,
            } => {
                for (cond, body) in branches {
                    if expect_bool(self.eval(cond).await?)? {
                        return self.exec_block(body).await;
                    }
                }
                return self.exec_block(otherwise).await;
            }
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => Some(self.eval(expr).await?),
                    None => None,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::Eval(expr) => {
                self.eval(expr).await?;
            }
        }
        Ok(Flow::Next)
    }

    fn set_field(&mut self, field: Field, value: Value) -> EffectResult<()> {
        if self.participant.is_dead() {
            return Ok(());
        }
        match field {
            Field::Sickness => {
                let n = expect_int(value)?;
                self.participant
                    .set_sickness(u32::try_from(n.max(0)).unwrap_or(u32::MAX));
            }
            Field::Infected => self.participant.set_infected(expect_bool(value)?),
            Field::Healer => self.participant.set_healer(expect_bool(value)?),
            Field::Masked => self.participant.set_masked(expect_bool(value)?),
            other => {
                return Err(EffectError::Type {
                    message: format!("`{}` is read-only", other.name()),
                });
            }
        }
        Ok(())
    }

    fn eval<'s>(&'s mut self, expr: &'s Expr) -> BoxFuture<'s, EffectResult<Value>> {
        Box::pin(async move {
            match expr {
                Expr::Const(value) => Ok(value.clone()),
                Expr::Local(slot) => Ok(self.locals.get(*slot).cloned().unwrap_or(Value::Unit)),
                Expr::Field(field) => Ok(read_field(*field, &*self.participant)),
                Expr::Not(inner) => Ok(Value::Bool(!expect_bool(self.eval(inner).await?)?)),
                Expr::Neg(inner, span) => negate(self.eval(inner).await?, span),
                Expr::Binary { op, lhs, rhs, span } => {
                    let left = self.eval(lhs).await?;
                    match (op, left.as_bool()) {
                        (BinaryOp::And, Some(false)) => return Ok(Value::Bool(false)),
                        (BinaryOp::Or, Some(true)) => return Ok(Value::Bool(true)),
                        _ => {}
                    }
                    let right = self.eval(rhs).await?;
                    binary(*op, left, right, span)
                }
                Expr::Call {
                    builtin,
                    args,
                    span,
                } => {
                    let mut values = Vec::with_capacity(args.len());
                    for arg in args {
                        values.push(self.eval(arg).await?);
                    }
                    self.call(*builtin, values, span).await
                }
                Expr::Choose { arms, span } => {
                    let weights: Vec<f64> = arms.iter().map(|(w, _)| *w).collect();
                    let index = pick_weighted(&mut *self.rng, &weights)
                        .ok_or_else(|| EffectError::ZeroWeights { span: span.clone() })?;
                    match arms.get(index) {
                        Some((_, outcome)) => self.eval(outcome).await,
                        None => Err(EffectError::ZeroWeights { span: span.clone() }),
                    }
                }
            }
        })
    }

    async fn call(&mut self, builtin: Builtin, args: Vec<Value>, span: &Span) -> EffectResult<Value> {
        let mut args = args.into_iter();
        let mut next = || args.next().unwrap_or(Value::Unit);

        Ok(match builtin {
            Builtin::Random => Value::Float(self.rng.random()),
            Builtin::Randint => {
                let low = expect_int(next())?;
                let high = expect_int(next())?;
                if low > high {
                    return Err(EffectError::EmptyRange {
                        low,
                        high,
                        span: span.clone(),
                    });
                }
                Value::Int(self.rng.random_range(low..=high))
            }
            Builtin::AddSickness => {
                let delta = match next() {
                    Value::Unit => None,
                    value => Some(expect_int(value)?),
                };
                Value::Signal(self.participant.add_sickness(delta, &mut *self.rng, self.now))
            }
            Builtin::Infect => Value::Bool(self.participant.infect(self.now)),
            Builtin::Kill => Value::Bool(self.participant.kill(self.now)),
            Builtin::Cure => Value::Signal(self.participant.cure()),
            Builtin::BecomeHealer => {
                if self.participant.is_dead() {
                    Value::Signal(Signal::AlreadyDead)
                } else {
                    self.participant.become_healer();
                    Value::Signal(Signal::BecameHealer)
                }
            }
            Builtin::AskNumber | Builtin::AskConfirm => {
                let kind = if builtin == Builtin::AskNumber {
                    AskKind::Number
                } else {
                    AskKind::Confirm
                };
                let prompt = next().to_string();
                Value::Reply(self.host.ask(&prompt, kind).await)
            }
            Builtin::Broadcast => {
                self.host.broadcast(&next().to_string()).await;
                Value::Unit
            }
            Builtin::Narrate => {
                self.host.narrate(&next().to_string()).await;
                Value::Unit
            }
            pure => {
                let values = [next(), next()];
                return call_pure(pure, values, span);
            }
        })
    }
}

fn call_pure(builtin: Builtin, [a, b]: [Value; 2], span: &Span) -> EffectResult<Value> {
    match builtin {
        Builtin::Min | Builtin::Max => {
            let want_min = builtin == Builtin::Min;
            if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
                return Ok(Value::Int(if want_min { x.min(y) } else { x.max(y) }));
            }
            let (x, y) = (expect_float(&a)?, expect_float(&b)?);
            Ok(Value::Float(if want_min { x.min(y) } else { x.max(y) }))
        }
        Builtin::Answered => Ok(Value::Bool(matches!(
            expect_reply(a)?,
            Reply::Answered(_)
        ))),
        Builtin::TimedOut => Ok(Value::Bool(expect_reply(a)? == Reply::TimedOut)),
        Builtin::ValueOr => Ok(match expect_reply(a)? {
            Reply::Answered(Answer::Number(n)) => Value::Int(n),
            Reply::Answered(Answer::Confirm(c)) => Value::Bool(c),
            Reply::Invalid | Reply::TimedOut => b,
        }),
        other => Err(EffectError::Type {
            message: format!("`{}` cannot run here (at {span:?})", other.name()),
        }),
    }
}

fn eval_pure(expr: &Expr, participant: &Participant) -> EffectResult<Value> {
    match expr {
        Expr::Const(value) => Ok(value.clone()),
        Expr::Field(field) => Ok(read_field(*field, participant)),
        Expr::Not(inner) => Ok(Value::Bool(!expect_bool(eval_pure(inner, participant)?)?)),
        Expr::Neg(inner, span) => negate(eval_pure(inner, participant)?, span),
        Expr::Binary { op, lhs, rhs, span } => {
            let left = eval_pure(lhs, participant)?;
            match (op, left.as_bool()) {
                (BinaryOp::And, Some(false)) => return Ok(Value::Bool(false)),
                (BinaryOp::Or, Some(true)) => return Ok(Value::Bool(true)),
                _ => {}
            }
            binary(*op, left, eval_pure(rhs, participant)?, span)
        }
        Expr::Call {
            builtin,
            args,
            span,
        } if builtin.is_pure() => {
            let mut values = args
                .iter()
                .map(|a| eval_pure(a, participant))
                .collect::<EffectResult<Vec<_>>>()?
                .into_iter();
            let a = values.next().unwrap_or(Value::Unit);
            let b = values.next().unwrap_or(Value::Unit);
            call_pure(*builtin, [a, b], span)
        }
        other => Err(EffectError::Type {
            message: format!("not allowed in a predicate: {other:?}"),
        }),
    }
}

fn read_field(field: Field, p: &Participant) -> Value {
    match field {
        Field::Sickness => Value::Int(i64::from(p.sickness())),
        Field::Infected => Value::Bool(p.infected()),
        Field::Healer => Value::Bool(p.healer()),
        Field::Masked => Value::Bool(p.masked()),
        Field::Immunocompromised => Value::Bool(p.immunocompromised()),
        Field::IsDead => Value::Bool(p.is_dead()),
        Field::Infectious => Value::Bool(p.is_infectious()),
        Field::Susceptible => Value::Bool(p.is_susceptible()),
        Field::SicknessRate => Value::Float(sickness_rate(p)),
    }
}

fn negate(value: Value, span: &Span) -> EffectResult<Value> {
    match value {
        Value::Int(n) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| EffectError::Overflow { span: span.clone() }),
        Value::Float(n) => Ok(Value::Float(-n)),
        other => Err(type_error("a number", &other)),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value, span: &Span) -> EffectResult<Value> {
    let overflow = || EffectError::Overflow { span: span.clone() };
    match op {
        BinaryOp::And | BinaryOp::Or => Ok(Value::Bool(expect_bool(right)?)),
        BinaryOp::Eq => Ok(Value::Bool(equal(&left, &right))),
        BinaryOp::NotEq => Ok(Value::Bool(!equal(&left, &right))),
        BinaryOp::Add if matches!(left, Value::Str(_)) => Ok(Value::Str(format!("{left}{right}"))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let (x, y) = (expect_float(&left)?, expect_float(&right)?);
            Ok(Value::Bool(match op {
                BinaryOp::Lt => x < y,
                BinaryOp::Le => x <= y,
                BinaryOp::Gt => x > y,
                _ => x >= y,
            }))
        }
        _ => match (&left, &right) {
            (Value::Int(x), Value::Int(y)) => {
                let result = match op {
                    BinaryOp::Add => x.checked_add(*y),
                    BinaryOp::Sub => x.checked_sub(*y),
                    BinaryOp::Mul => x.checked_mul(*y),
                    _ if *y == 0 => {
                        return Err(EffectError::DivisionByZero { span: span.clone() });
                    }
                    _ => x.checked_div(*y),
                };
                result.map(Value::Int).ok_or_else(overflow)
            }
            _ => {
                let (x, y) = (expect_float(&left)?, expect_float(&right)?);
                let result = match op {
                    BinaryOp::Add => x + y,
                    BinaryOp::Sub => x - y,
                    BinaryOp::Mul => x * y,
                    _ if y == 0.0 => {
                        return Err(EffectError::DivisionByZero { span: span.clone() });
                    }
                    _ => x / y,
                };
                Ok(Value::Float(result))
            }
        },
    }
}

fn equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            left.as_float() == right.as_float()
        }
        _ => left == right,
    }
}

fn type_error(expected: &str, found: &Value) -> EffectError {
    EffectError::Type {
        message: format!("expected {expected}, found `{found}`"),
    }
}

fn expect_bool(value: Value) -> EffectResult<bool> {
    value.as_bool().ok_or_else(|| type_error("a bool", &value))
}

fn expect_int(value: Value) -> EffectResult<i64> {
    value.as_int().ok_or_else(|| type_error("an int", &value))
}

fn expect_float(value: &Value) -> EffectResult<f64> {
    value.as_float().ok_or_else(|| type_error("a number", value))
}

fn expect_reply(value: Value) -> EffectResult<Reply> {
    value.as_reply().ok_or_else(|| type_error("a reply", &value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{compile_effect, compile_predicate};
    use outbreak_core::ParticipantId;
    use rand::SeedableRng;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct ScriptedHost {
        replies: VecDeque<Reply>,
        prompts: Vec<String>,
        broadcasts: Vec<String>,
        narration: Vec<String>,
    }

    #[async_trait]
    impl Host for ScriptedHost {
        async fn ask(&mut self, prompt: &str, _kind: AskKind) -> Reply {
            self.prompts.push(prompt.to_owned());
            self.replies.pop_front().unwrap_or(Reply::TimedOut)
        }

        async fn broadcast(&mut self, text: &str) {
            self.broadcasts.push(text.to_owned());
        }

        async fn narrate(&mut self, text: &str) {
            self.narration.push(text.to_owned());
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2020-02-10T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn infected(sickness: u32) -> Participant {
        let mut p = Participant::with_immunity(ParticipantId(1), false);
        p.infect(now());
        p.set_sickness(sickness);
        p
    }

    async fn run(source: &str, p: &mut Participant, host: &mut ScriptedHost) -> EffectResult<Signal> {
        let effect = compile_effect(source).program.unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        effect.run(p, &mut rng, host, now()).await
    }

    #[test]
    fn weighted_choice_converges() {
        let mut rng = StdRng::seed_from_u64(42);
        let trials = 100_000;
        let firsts = (0..trials)
            .filter(|_| pick_weighted(&mut rng, &[10.0, 90.0]) == Some(0))
            .count();
        let share = firsts as f64 / trials as f64;
        assert!((share - 0.10).abs() < 0.01, "share was {share}");
    }

    #[test]
    fn weighted_choice_three_way_and_zero() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut counts = [0usize; 3];
        for _ in 0..30_000 {
            counts[pick_weighted(&mut rng, &[1.0, 0.0, 2.0]).unwrap()] += 1;
        }
        assert_eq!(counts[1], 0);
        assert!(counts[2] > counts[0]);
        assert_eq!(pick_weighted(&mut rng, &[0.0, 0.0]), None);
        assert_eq!(pick_weighted(&mut rng, &[]), None);
    }

    #[test]
    fn weighted_choice_refuses_overflowing_weights() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(pick_weighted(&mut rng, &[f64::MAX, f64::MAX]), None);
        assert_eq!(pick_weighted(&mut rng, &[f64::INFINITY, 1.0]), None);
        assert_eq!(pick_weighted(&mut rng, &[f64::NAN, 1.0]), Some(1));
    }

    #[tokio::test]
    async fn assignment_and_default_signal() {
        let mut p = infected(20);
        let mut host = ScriptedHost::default();
        let signal = run("masked = true\nsickness = sickness - 5", &mut p, &mut host).await;
        assert_eq!(signal, Ok(Signal::Alive));
        assert!(p.masked());
        assert_eq!(p.sickness(), 15);
    }

    #[tokio::test]
    async fn add_sickness_crossing_threshold_latches_dead() {
        let mut p = infected(92);
        let mut host = ScriptedHost::default();
        let signal = run("return add_sickness(10)", &mut p, &mut host).await;
        assert_eq!(signal, Ok(Signal::Dead));
        assert_eq!(p.sickness(), 102);
        assert!(p.death().is_some());
    }

    #[tokio::test]
    async fn negative_assignment_clamps_to_zero() {
        let mut p = infected(10);
        let mut host = ScriptedHost::default();
        run("sickness = sickness - 30", &mut p, &mut host).await.unwrap();
        assert_eq!(p.sickness(), 0);
    }

    #[tokio::test]
    async fn dead_participant_fields_are_frozen() {
        let mut p = infected(10);
        p.kill(now());
        let mut host = ScriptedHost::default();
        let signal = run("masked = true\nreturn cure()", &mut p, &mut host).await;
        assert_eq!(signal, Ok(Signal::AlreadyDead));
        assert!(!p.masked());
    }

    #[tokio::test]
    async fn branches_pick_first_true() {
        let mut p = infected(50);
        let mut host = ScriptedHost::default();
        let source = "if sickness > 80 {\n    return dead\n} else if sickness > 40 {\n    narrate(\"middling\")\n    return cured\n} else {\n    return alive\n}";
        assert_eq!(run(source, &mut p, &mut host).await, Ok(Signal::Cured));
        assert_eq!(host.narration, vec!["middling"]);
    }

    #[tokio::test]
    async fn short_circuit_skips_right_side() {
        let mut p = infected(50);
        let mut host = ScriptedHost::default();
        run("let x = 0\nif healer and 10 / x > 1 {\n    pass\n}", &mut p, &mut host)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn division_by_zero_is_reported() {
        let mut p = infected(50);
        let mut host = ScriptedHost::default();
        let err = run("let x = 0\nsickness = 10 / x", &mut p, &mut host).await;
        assert!(matches!(err, Err(EffectError::DivisionByZero { .. })));
    }

    #[tokio::test]
    async fn randint_empty_range_is_reported() {
        let mut p = infected(50);
        let mut host = ScriptedHost::default();
        let err = run("sickness = randint(5, 1)", &mut p, &mut host).await;
        assert!(matches!(err, Err(EffectError::EmptyRange { low: 5, high: 1, .. })));
    }

    #[tokio::test]
    async fn integer_overflow_is_reported() {
        let mut p = infected(50);
        let mut host = ScriptedHost::default();
        let err = run("let x = 9223372036854775807\nsickness = x + 1", &mut p, &mut host).await;
        assert!(matches!(err, Err(EffectError::Overflow { .. })));
    }

    #[tokio::test]
    async fn randint_is_inclusive() {
        let effect = compile_effect("sickness = randint(3, 4)").program.unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let mut host = ScriptedHost::default();
        let mut seen = [false; 2];
        for _ in 0..200 {
            let mut p = infected(50);
            effect.run(&mut p, &mut rng, &mut host, now()).await.unwrap();
            assert!((3..=4).contains(&p.sickness()));
            seen[(p.sickness() - 3) as usize] = true;
        }
        assert_eq!(seen, [true, true]);
    }

    #[tokio::test]
    async fn choose_only_evaluates_selected_outcome() {
        let mut p = infected(50);
        let mut host = ScriptedHost::default();
        let signal = run("return choose { 1: become_healer(), 0: cure() }", &mut p, &mut host).await;
        assert_eq!(signal, Ok(Signal::BecameHealer));
        assert_eq!(p.sickness(), 50);
    }

    #[tokio::test]
    async fn replies_are_distinguished() {
        let source = "let r = ask_number(\"How much soap?\")\nif timed_out(r) {\n    return alive\n}\nif r == invalid {\n    broadcast(\"that is not a number\")\n    return alive\n}\nsickness = sickness - value_or(r, 0)\nreturn cured";

        let mut p = infected(50);
        let mut host = ScriptedHost {
            replies: VecDeque::from([Reply::Answered(Answer::Number(20))]),
            ..Default::default()
        };
        assert_eq!(run(source, &mut p, &mut host).await, Ok(Signal::Cured));
        assert_eq!(p.sickness(), 30);
        assert_eq!(host.prompts, vec!["How much soap?"]);

        let mut p = infected(50);
        let mut host = ScriptedHost {
            replies: VecDeque::from([Reply::Invalid]),
            ..Default::default()
        };
        assert_eq!(run(source, &mut p, &mut host).await, Ok(Signal::Alive));
        assert_eq!(host.broadcasts, vec!["that is not a number"]);
        assert_eq!(p.sickness(), 50);

        let mut p = infected(50);
        let mut host = ScriptedHost::default();
        assert_eq!(run(source, &mut p, &mut host).await, Ok(Signal::Alive));
        assert!(host.broadcasts.is_empty());
        assert_eq!(p.sickness(), 50);
    }

    #[tokio::test]
    async fn concatenation_and_float_math() {
        let mut p = infected(40);
        let mut host = ScriptedHost::default();
        run("narrate(\"rate \" + sickness_rate / 2 + \" and \" + 7 / 2)", &mut p, &mut host)
            .await
            .unwrap();
        assert_eq!(host.narration, vec!["rate 20 and 3"]);
    }

    #[tokio::test]
    async fn become_healer_sets_flag() {
        let mut p = infected(40);
        let mut host = ScriptedHost::default();
        assert_eq!(
            run("return become_healer()", &mut p, &mut host).await,
            Ok(Signal::BecameHealer)
        );
        assert!(p.healer());
    }

    #[test]
    fn predicates_evaluate() {
        let not_healer = compile_predicate("not healer").program.unwrap();
        let mut p = infected(40);
        assert_eq!(not_healer.evaluate(&p), Ok(true));
        p.become_healer();
        assert_eq!(not_healer.evaluate(&p), Ok(false));

        let severe = compile_predicate("max(sickness, 10) >= 40 and infectious").program.unwrap();
        assert_eq!(severe.evaluate(&p), Ok(true));
        assert_eq!(Predicate::always().evaluate(&p), Ok(true));
    }
}
