use std::collections::HashMap;

use outbreak_core::Signal;

use crate::ast::{self, BinaryOp, Span, Spanned, UnaryOp};
use crate::diagnostics::Diagnostic;
use crate::lexer;
use crate::parser;
use crate::program::{Builtin, Effect, Expr, Field, Predicate, Stmt};
use crate::value::{Reply, Ty, Value};

/// Result of compiling one script.
#[derive(Debug, Clone)]
pub struct CompileResult<T> {
    /// The compiled script; `None` if any error was reported.
    pub program: Option<T>,
    /// Errors and warnings, spans relative to the compiled text.
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> CompileResult<T> {
    /// Returns `true` if any diagnostic has error severity.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    fn failed(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            program: None,
            diagnostics,
        }
    }
}

fn front_end<T>(
    source: &str,
    parse: impl FnOnce(&[(lexer::Token, Span)]) -> Result<T, Vec<parser::ParseError>>,
) -> Result<T, Vec<Diagnostic>> {
    let (tokens, lex_errors) = lexer::lex(source);
    let mut diagnostics: Vec<Diagnostic> = lex_errors
        .into_iter()
        .map(|e| Diagnostic::error(e.span, e.message))
        .collect();
    match parse(&tokens) {
        Ok(ast) if diagnostics.is_empty() => Ok(ast),
        Ok(_) => Err(diagnostics),
        Err(errors) => {
            diagnostics.extend(
                errors
                    .into_iter()
                    .map(|e| Diagnostic::error(e.span, e.message)),
            );
            Err(diagnostics)
        }
    }
}

/// Compile effect source text.
pub fn compile_effect(source: &str) -> CompileResult<Effect> {
    let ast = match front_end(source, parser::parse_effect) {
        Ok(ast) => ast,
        Err(diagnostics) => return CompileResult::failed(diagnostics),
    };

    let mut compiler = Compiler::new(Mode::Effect);
    let body = compiler.block(&ast);
    let program = Effect {
        body,
        locals: compiler.next_slot,
    };
    compiler.finish(program)
}

/// Compile predicate source text. Blank text is the always-true predicate.
pub fn compile_predicate(source: &str) -> CompileResult<Predicate> {
    if source.trim().is_empty() {
        return CompileResult {
            program: Some(Predicate::always()),
            diagnostics: Vec::new(),
        };
    }
    let ast = match front_end(source, parser::parse_predicate) {
        Ok(ast) => ast,
        Err(diagnostics) => return CompileResult::failed(diagnostics),
    };

    let mut compiler = Compiler::new(Mode::Predicate);
    let (expr, ty) = compiler.expr(&ast);
    if !Ty::Bool.accepts(ty) {
        compiler.error(
            ast.span.clone(),
            format!("a predicate must be a bool expression, found {ty}"),
        );
    }
    compiler.finish(Predicate { expr })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Effect,
    Predicate,
}

struct Compiler {
    mode: Mode,
    diagnostics: Vec<Diagnostic>,
    scopes: Vec<HashMap<String, (usize, Ty)>>,
    next_slot: usize,
}

impl Compiler {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            diagnostics: Vec::new(),
            scopes: vec![HashMap::new()],
            next_slot: 0,
        }
    }

    fn finish<T>(self, program: T) -> CompileResult<T> {
        let has_errors = self.diagnostics.iter().any(Diagnostic::is_error);
        CompileResult {
            program: (!has_errors).then_some(program),
            diagnostics: self.diagnostics,
        }
    }

    fn error(&mut self, span: Span, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::error(span, message));
    }

    fn mismatch(&mut self, span: Span, message: impl Into<String>, expected: Ty, found: Ty) {
        self.diagnostics.push(
            Diagnostic::error(span, message).with_label(format!("expected {expected}, found {found}")),
        );
    }

    fn lookup_local(&self, name: &str) -> Option<(usize, Ty)> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    // -- Statements --

    fn block(&mut self, stmts: &[Spanned<ast::Stmt>]) -> Vec<Stmt> {
        self.scopes.push(HashMap::new());
        let lowered = stmts.iter().filter_map(|s| self.stmt(s)).collect();
        self.scopes.pop();
        lowered
    }

    fn stmt(&mut self, stmt: &Spanned<ast::Stmt>) -> Option<Stmt> {
        match &stmt.node {
            ast::Stmt::Pass => None,

            ast::Stmt::Let { name, value } => {
                let (expr, ty) = self.expr(value);
                if let Some(kind) = reserved_kind(&name.node) {
                    self.error(
                        name.span.clone(),
                        format!("cannot declare `{}`: it is a {kind}", name.node),
                    );
                }
                if ty == Ty::Unit {
                    self.error(value.span.clone(), "this expression has no value");
                }
                let slot = self.next_slot;
                self.next_slot += 1;
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(name.node.clone(), (slot, ty));
                }
                Some(Stmt::SetLocal(slot, expr))
            }

            ast::Stmt::Assign { target, value } => {
                let (expr, ty) = self.expr(value);
                if let Some((slot, declared)) = self.lookup_local(&target.node) {
                    if !declared.accepts(ty) {
                        self.mismatch(
                            value.span.clone(),
                            format!("cannot assign {ty} to `{}`", target.node),
                            declared,
                            ty,
                        );
                    }
                    return Some(Stmt::SetLocal(slot, expr));
                }
                let Some(field) = Field::from_name(&target.node) else {
                    self.error(
                        target.span.clone(),
                        format!("unknown name `{}`; declare it with `let`", target.node),
                    );
                    return None;
                };
                if !field.is_writable() {
                    self.error(
                        target.span.clone(),
                        format!("`{}` is read-only", field.name()),
                    );
                } else if !field.ty().accepts(ty) {
                    self.mismatch(
                        value.span.clone(),
                        format!("cannot assign {ty} to `{}`", field.name()),
                        field.ty(),
                        ty,
                    );
                }
                Some(Stmt::SetField(field, expr))
            }

            ast::Stmt::If {
                branches,
                otherwise,
            } => {
                let branches = branches
                    .iter()
                    .map(|(cond, body)| {
                        let (cond_expr, ty) = self.expr(cond);
                        if !Ty::Bool.accepts(ty) {
                            self.mismatch(cond.span.clone(), "condition must be a bool", Ty::Bool, ty);
                        }
                        (cond_expr, self.block(body))
                    })
                    .collect();
                let otherwise = otherwise
                    .as_ref()
                    .map(|body| self.block(body))
                    .unwrap_or_default();
                Some(Stmt::If {
                    branches,
                    otherwise,
                })
            }

            ast::Stmt::Return(None) => Some(Stmt::Return(None)),

            ast::Stmt::Return(Some(value)) => {
                let (expr, ty) = self.expr(value);
                if !Ty::Signal.accepts(ty) {
                    self.mismatch(
                        value.span.clone(),
                        "an effect returns a signal",
                        Ty::Signal,
                        ty,
                    );
                }
                Some(Stmt::Return(Some(expr)))
            }

            ast::Stmt::Expr(value) => {
                if !matches!(value.node, ast::Expr::Call { .. } | ast::Expr::Choose(_)) {
                    self.diagnostics.push(Diagnostic::warning(
                        value.span.clone(),
                        "expression result is unused",
                    ));
                }
                let (expr, _) = self.expr(value);
                Some(Stmt::Eval(expr))
            }
        }
    }

    // -- Expressions --

    fn expr(&mut self, expr: &Spanned<ast::Expr>) -> (Expr, Ty) {
        let span = expr.span.clone();
        match &expr.node {
            ast::Expr::Integer(n) => (Expr::Const(Value::Int(*n)), Ty::Int),
            ast::Expr::Float(n) => (Expr::Const(Value::Float(*n)), Ty::Float),
            ast::Expr::Str(s) => (Expr::Const(Value::Str(s.clone())), Ty::Str),
            ast::Expr::Boolean(b) => (Expr::Const(Value::Bool(*b)), Ty::Bool),
            ast::Expr::Name(name) => self.name(name, span),

            ast::Expr::Unary { op, expr: inner } => {
                let (operand, ty) = self.expr(inner);
                match op {
                    UnaryOp::Not => {
                        if !Ty::Bool.accepts(ty) {
                            self.mismatch(span, "`not` needs a bool", Ty::Bool, ty);
                            return (Expr::Not(Box::new(operand)), Ty::Unknown);
                        }
                        (Expr::Not(Box::new(operand)), Ty::Bool)
                    }
                    UnaryOp::Neg => {
                        if !ty.is_numeric() {
                            self.arithmetic_error(span.clone(), "-", ty);
                            return (Expr::Neg(Box::new(operand), span), Ty::Unknown);
                        }
                        (Expr::Neg(Box::new(operand), span), ty)
                    }
                }
            }

            ast::Expr::Binary { op, lhs, rhs } => {
                let (l, lt) = self.expr(lhs);
                let (r, rt) = self.expr(rhs);
                let ty = self.binary_type(*op, lt, rt, span.clone());
                (
                    Expr::Binary {
                        op: *op,
                        lhs: Box::new(l),
                        rhs: Box::new(r),
                        span,
                    },
                    ty,
                )
            }

            ast::Expr::Call { name, args } => self.call(name, args, span),

            ast::Expr::Choose(arms) => {
                if self.mode == Mode::Predicate {
                    self.error(span.clone(), "`choose` is random and not allowed in a predicate");
                }
                let mut lowered = Vec::with_capacity(arms.len());
                let mut result = None::<Ty>;
                for (weight, outcome) in arms {
                    let (expr, ty) = self.expr(outcome);
                    result = Some(match result {
                        None => ty,
                        Some(prev) if prev.accepts(ty) => prev,
                        Some(prev) if ty.accepts(prev) => ty,
                        Some(prev) => {
                            self.mismatch(
                                outcome.span.clone(),
                                "choose outcomes must have the same type",
                                prev,
                                ty,
                            );
                            Ty::Unknown
                        }
                    });
                    lowered.push((weight.node, expr));
                }
                let total = lowered.iter().map(|(w, _)| *w).sum::<f64>();
                if !total.is_finite() {
                    self.error(span.clone(), "choose weights overflow");
                } else if total <= 0.0 {
                    self.error(span.clone(), "choose weights sum to zero");
                }
                (
                    Expr::Choose {
                        arms: lowered,
                        span,
                    },
                    result.unwrap_or(Ty::Unknown),
                )
            }
        }
    }

    fn name(&mut self, name: &str, span: Span) -> (Expr, Ty) {
        if let Some((slot, ty)) = self.lookup_local(name) {
            return (Expr::Local(slot), ty);
        }
        if let Some(field) = Field::from_name(name) {
            return (Expr::Field(field), field.ty());
        }
        if let Some(signal) = Signal::from_name(name) {
            return (Expr::Const(Value::Signal(signal)), Ty::Signal);
        }
        match name {
            "timeout" => (Expr::Const(Value::Reply(Reply::TimedOut)), Ty::ReplyLiteral),
            "invalid" => (Expr::Const(Value::Reply(Reply::Invalid)), Ty::ReplyLiteral),
            _ => {
                let hint = if Builtin::from_name(name).is_some() {
                    format!("`{name}` is a function; call it with `{name}()`")
                } else {
                    format!("unknown name `{name}`")
                };
                self.error(span, hint);
                (Expr::Const(Value::Unit), Ty::Unknown)
            }
        }
    }

    fn arithmetic_error(&mut self, span: Span, op: &str, ty: Ty) {
        let message = if ty.is_reply() {
            format!("cannot use `{op}` on a reply; unwrap it with value_or(..)")
        } else {
            format!("cannot use `{op}` on {ty}")
        };
        self.diagnostics.push(Diagnostic::error(span, message));
    }

    fn binary_type(&mut self, op: BinaryOp, lt: Ty, rt: Ty, span: Span) -> Ty {
        if lt == Ty::Unknown || rt == Ty::Unknown {
            return match op {
                BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => Ty::Unknown,
                _ => Ty::Bool,
            };
        }
        match op {
            BinaryOp::Add if lt == Ty::Str && rt != Ty::Unit => Ty::Str,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                if lt.is_numeric() && rt.is_numeric() {
                    lt.promote(rt)
                } else {
                    let bad = if lt.is_numeric() { rt } else { lt };
                    self.arithmetic_error(span, op.symbol(), bad);
                    Ty::Unknown
                }
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                if !(lt.is_numeric() && rt.is_numeric()) {
                    let bad = if lt.is_numeric() { rt } else { lt };
                    self.arithmetic_error(span, op.symbol(), bad);
                }
                Ty::Bool
            }
            BinaryOp::Eq | BinaryOp::NotEq => {
                let comparable = lt == rt
                    || (lt.is_numeric() && rt.is_numeric())
                    || (lt.is_reply() && rt.is_reply());
                if !comparable {
                    self.error(span, format!("cannot compare {lt} with {rt}"));
                }
                Ty::Bool
            }
            BinaryOp::And | BinaryOp::Or => {
                if lt != Ty::Bool || rt != Ty::Bool {
                    let found = if lt == Ty::Bool { rt } else { lt };
                    self.mismatch(
                        span,
                        format!("`{}` needs bool operands", op.symbol()),
                        Ty::Bool,
                        found,
                    );
                }
                Ty::Bool
            }
        }
    }

    fn call(&mut self, name: &Spanned<String>, args: &[Spanned<ast::Expr>], span: Span) -> (Expr, Ty) {
        let lowered: Vec<(Expr, Ty)> = args.iter().map(|a| self.expr(a)).collect();
        let Some(builtin) = Builtin::from_name(&name.node) else {
            self.error(name.span.clone(), format!("unknown function `{}`", name.node));
            return (Expr::Const(Value::Unit), Ty::Unknown);
        };

        let (min, max) = builtin.arity();
        if args.len() < min || args.len() > max {
            let expected = if min == max {
                format!("{min}")
            } else {
                format!("{min} to {max}")
            };
            self.error(
                span.clone(),
                format!(
                    "`{}` takes {expected} argument(s), found {}",
                    builtin.name(),
                    args.len()
                ),
            );
        } else if self.mode == Mode::Predicate && !builtin.is_pure() {
            self.error(
                name.span.clone(),
                format!("`{}` is not allowed in a predicate", builtin.name()),
            );
        }

        let types: Vec<Ty> = lowered.iter().map(|(_, t)| *t).collect();
        let ty = self.check_args(builtin, &types, args);
        (
            Expr::Call {
                builtin,
                args: lowered.into_iter().map(|(e, _)| e).collect(),
                span,
            },
            ty,
        )
    }

    /// Check argument types and compute the result type.
    fn check_args(&mut self, builtin: Builtin, types: &[Ty], args: &[Spanned<ast::Expr>]) -> Ty {
        let expect = |this: &mut Self, index: usize, want: Ty| {
            if let (Some(&found), Some(arg)) = (types.get(index), args.get(index)) {
                if want.accepts(found) {
                    return;
                }
                this.mismatch(
                    arg.span.clone(),
                    format!("wrong argument type for `{}`", builtin.name()),
                    want,
                    found,
                );
            }
        };

        match builtin {
            Builtin::Random => Ty::Float,
            Builtin::Randint => {
                expect(self, 0, Ty::Int);
                expect(self, 1, Ty::Int);
                Ty::Int
            }
            Builtin::Min | Builtin::Max => {
                let mut result = Ty::Int;
                for (i, ty) in types.iter().enumerate() {
                    if ty.is_numeric() {
                        result = result.promote(*ty);
                    } else {
                        expect(self, i, Ty::Float);
                    }
                }
                result
            }
            Builtin::AddSickness => {
                expect(self, 0, Ty::Int);
                Ty::Signal
            }
            Builtin::Infect | Builtin::Kill => Ty::Bool,
            Builtin::Cure | Builtin::BecomeHealer => Ty::Signal,
            Builtin::AskNumber => {
                expect(self, 0, Ty::Str);
                Ty::NumberReply
            }
            Builtin::AskConfirm => {
                expect(self, 0, Ty::Str);
                Ty::ConfirmReply
            }
            Builtin::Answered | Builtin::TimedOut => {
                let unwrapped = types.first().copied().zip(args.first());
                if let Some((found, arg)) = unwrapped.filter(|(found, _)| !found.is_reply()) {
                    self.mismatch(
                        arg.span.clone(),
                        format!("`{}` needs a reply", builtin.name()),
                        Ty::NumberReply,
                        found,
                    );
                }
                Ty::Bool
            }
            Builtin::ValueOr => match types.first() {
                Some(Ty::NumberReply) => {
                    expect(self, 1, Ty::Int);
                    Ty::Int
                }
                Some(Ty::ConfirmReply) => {
                    expect(self, 1, Ty::Bool);
                    Ty::Bool
                }
                Some(Ty::Unknown) | None => Ty::Unknown,
                Some(&found) => {
                    if let Some(arg) = args.first() {
                        self.mismatch(
                            arg.span.clone(),
                            "`value_or` needs a reply from ask_number or ask_confirm",
                            Ty::NumberReply,
                            found,
                        );
                    }
                    Ty::Unknown
                }
            },
            Builtin::Broadcast | Builtin::Narrate => {
                expect(self, 0, Ty::Str);
                Ty::Unit
            }
        }
    }
}

/// Names a `let` may not take, with what they already are.
fn reserved_kind(name: &str) -> Option<&'static str> {
    if Field::from_name(name).is_some() {
        Some("participant field")
    } else if Signal::from_name(name).is_some() {
        Some("signal")
    } else if name == "timeout" || name == "invalid" {
        Some("reply literal")
    } else if Builtin::from_name(name).is_some() {
        Some("function")
    } else {
        None
    }
}
