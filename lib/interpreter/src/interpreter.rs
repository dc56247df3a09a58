use std::{
    io::{self, Write},
    ops::{Deref, DerefMut},
};

use errors::{Diagnostic, Diagnostics};
use parser::{Expr, Stmt};
use scanner::{Token, TokenKind};
use value::Value;

mod environment;
pub use environment::{Environment, FrameId};

use TokenKind::*;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RuntimeErrorType {
    #[error("Operand must be a number.")]
    OperandMustBeNumber,
    #[error("Operands must be numbers.")]
    OperandsMustBeNumbers,
    #[error("Operands must be two numbers or two strings.")]
    OperandsMustBeNumbersOrStrings,
    #[error("Division by zero.")]
    DivisionByZero,
    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(String),
    #[error("Unknown operator '{0}'.")]
    UnknownOperator(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("[line {}] RuntimeError: {error}", .token.line)]
pub struct RuntimeError {
    pub error: RuntimeErrorType,
    pub token: Token,
}

impl RuntimeError {
    pub fn new(error: RuntimeErrorType, token: &Token) -> Self {
        Self { error, token: token.clone() }
    }
}

impl From<RuntimeError> for Diagnostic {
    fn from(e: RuntimeError) -> Self {
        Diagnostic::runtime(e.token.line, e.error)
    }
}

/// Why execution of a statement stopped early.
#[derive(thiserror::Error, Debug)]
enum Error {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("Failed to write output: {0}")]
    Output(#[from] io::Error),
}

/// Tree-walking evaluator.
///
/// The global frame outlives individual calls to [`Interpreter::interpret`],
/// so definitions accumulate across runs (which is what the REPL relies on).
#[derive(Debug, Default)]
pub struct Interpreter {
    environment: Environment,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Scans, parses and (if that produced no compile errors) executes `source`.
    pub fn run_source(
        &mut self,
        source: &str,
        output: &mut impl Write,
    ) -> io::Result<Diagnostics> {
        self.run_source_with(source, output, |_| ())
    }

    /// Like [`Interpreter::run_source`], but hands the parsed statements to
    /// `inspect` first, even when they contain compile errors.
    pub fn run_source_with(
        &mut self,
        source: &str,
        output: &mut impl Write,
        inspect: impl FnOnce(&[Option<Stmt>]),
    ) -> io::Result<Diagnostics> {
        let mut diagnostics = Diagnostics::new();

        let tokens = scanner::scan_tokens(source, &mut diagnostics);
        let stmts = parser::parse(tokens, &mut diagnostics);
        inspect(&stmts);

        if diagnostics.had_compile_error() {
            log::debug!("Not executing, compile errors were reported");
            return Ok(diagnostics);
        }

        self.interpret(&stmts, output, &mut diagnostics)?;
        Ok(diagnostics)
    }

    /// Executes `stmts` in order, skipping the ones that failed to parse.
    ///
    /// The first runtime error is reported to `diagnostics` and stops
    /// execution. Only failures to write to `output` are returned.
    pub fn interpret(
        &mut self,
        stmts: &[Option<Stmt>],
        output: &mut impl Write,
        diagnostics: &mut Diagnostics,
    ) -> io::Result<()> {
        for stmt in stmts.iter().flatten() {
            match self.execute(stmt, output) {
                Ok(()) => (),
                Err(Error::Runtime(e)) => {
                    log::debug!("Runtime error, aborting: {}", e);
                    diagnostics.report(e);
                    return Ok(());
                }
                Err(Error::Output(e)) => return Err(e),
            }
        }
        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt, output: &mut dyn Write) -> Result<(), Error> {
        match stmt {
            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                writeln!(output, "{}", value)?;
            }
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(init) => self.evaluate(init)?,
                    None => Value::Nil,
                };
                self.environment.define(name.lexeme(), value);
            }
            Stmt::Block(stmts) => {
                let mut scope = Scope::new(self);
                for stmt in stmts.iter().flatten() {
                    scope.execute(stmt, output)?;
                }
            }
            Stmt::If { condition, then_branch, else_branch } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch, output)?;
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch, output)?;
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute(body, output)?;
                }
            }
        }
        Ok(())
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),

            Expr::Grouping(expr) => self.evaluate(expr),

            Expr::Unary { operator, right } => {
                let right = self.evaluate(right)?;
                match (operator.kind, right) {
                    (Minus, Value::Number(n)) => Ok((-n).into()),
                    (Minus, _) => {
                        Err(RuntimeError::new(RuntimeErrorType::OperandMustBeNumber, operator))
                    }
                    (Bang, v) => Ok((!v.is_truthy()).into()),
                    _ => Err(unknown_operator(operator)),
                }
            }

            Expr::Variable(name) => self.environment.get(name).cloned(),

            Expr::Assign { name, value } => {
                let value = self.evaluate(value)?;
                self.environment.assign(name, value.clone())?;
                Ok(value)
            }

            Expr::Logical { left, operator, right } => {
                let left = self.evaluate(left)?;
                let short_circuits = match operator.kind {
                    Or => left.is_truthy(),
                    And => !left.is_truthy(),
                    _ => return Err(unknown_operator(operator)),
                };

                if short_circuits {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Binary { left, operator, right } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary(operator, left, right)
            }
        }
    }
}

fn binary(operator: &Token, left: Value, right: Value) -> Result<Value, RuntimeError> {
    let error = |error| Err(RuntimeError::new(error, operator));

    match (operator.kind, left, right) {
        (Plus, Value::Number(l), Value::Number(r)) => Ok((l + r).into()),
        (Plus, Value::Str(l), Value::Str(r)) => Ok((l + &r).into()),
        (Plus, _, _) => error(RuntimeErrorType::OperandsMustBeNumbersOrStrings),

        (Minus, Value::Number(l), Value::Number(r)) => Ok((l - r).into()),
        (Star, Value::Number(l), Value::Number(r)) => Ok((l * r).into()),
        (Slash, Value::Number(_), Value::Number(r)) if r == 0.0 => {
            error(RuntimeErrorType::DivisionByZero)
        }
        (Slash, Value::Number(l), Value::Number(r)) => Ok((l / r).into()),

        (Greater, Value::Number(l), Value::Number(r)) => Ok((l > r).into()),
        (GreaterEqual, Value::Number(l), Value::Number(r)) => Ok((l >= r).into()),
        (Less, Value::Number(l), Value::Number(r)) => Ok((l < r).into()),
        (LessEqual, Value::Number(l), Value::Number(r)) => Ok((l <= r).into()),

        (Minus | Star | Slash | Greater | GreaterEqual | Less | LessEqual, _, _) => {
            error(RuntimeErrorType::OperandsMustBeNumbers)
        }

        (EqualEqual, l, r) => Ok(l.is_equal(&r).into()),
        (BangEqual, l, r) => Ok((!l.is_equal(&r)).into()),

        _ => Err(unknown_operator(operator)),
    }
}

fn unknown_operator(operator: &Token) -> RuntimeError {
    RuntimeError::new(RuntimeErrorType::UnknownOperator(operator.lexeme().to_string()), operator)
}

/// A block's frame. Entering creates a frame enclosed by the current one;
/// dropping the guard restores the previous frame, on errors as well.
struct Scope<'i> {
    interpreter: &'i mut Interpreter,
    previous: FrameId,
}

impl<'i> Scope<'i> {
    fn new(interpreter: &'i mut Interpreter) -> Self {
        let previous = interpreter.environment.push_frame();
        Self { interpreter, previous }
    }
}

impl Deref for Scope<'_> {
    type Target = Interpreter;

    fn deref(&self) -> &Self::Target {
        self.interpreter
    }
}

impl DerefMut for Scope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.interpreter
    }
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        self.interpreter.environment.restore(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use errors::DiagnosticKind;
    use pretty_assertions::assert_eq;

    use super::*;

    #[ctor::ctor]
    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn run_with(interpreter: &mut Interpreter, source: &str) -> (Vec<String>, Vec<String>) {
        let mut output = Vec::new();
        let diagnostics = interpreter.run_source(source, &mut output).unwrap();
        (
            String::from_utf8(output).unwrap().lines().map(str::to_string).collect(),
            diagnostics.iter().map(|d| d.to_string()).collect(),
        )
    }

    fn run(source: &str) -> (Vec<String>, Vec<String>) {
        run_with(&mut Interpreter::new(), source)
    }

    fn output_of(source: &str) -> Vec<String> {
        let (output, errors) = run(source);
        assert_eq!(errors, Vec::<String>::new());
        output
    }

    #[test]
    fn arithmetic() {
        assert_eq!(
            output_of(
                r#"
                print 1 + 2 * 3;
                print 10 / 4;
                print -(3);
                print (1 + 2) * 3;
                print 6.0;
                print 0.5 + 0.25;
                "#
            ),
            vec!["7", "2.5", "-3", "9", "6", "0.75"]
        );
        assert_eq!(output_of("print \"a\" + \"b\";"), vec!["ab"]);
    }

    #[test]
    fn comparison_and_equality() {
        assert_eq!(
            output_of("print 1 < 2; print 2 <= 2; print 1 > 2; print 3 >= 4;"),
            vec!["true", "true", "false", "false"]
        );
        assert_eq!(
            output_of(
                r#"
                print 1 == 1;
                print "a" == "a";
                print nil == false;
                print 1 != "1";
                print nil == nil;
                "#
            ),
            vec!["true", "true", "false", "true", "true"]
        );
    }

    #[test]
    fn unary_operators() {
        assert_eq!(
            output_of("print !nil; print !0; print !!\"\"; print -1.5;"),
            vec!["true", "false", "true", "-1.5"]
        );
    }

    #[test]
    fn truthiness_in_conditions() {
        assert_eq!(
            output_of(
                r#"
                if (0) print "zero";
                if ("") print "empty";
                if (nil) print "nil"; else print "else";
                "#
            ),
            vec!["zero", "empty", "else"]
        );
    }

    #[test]
    fn logical_operators_short_circuit() {
        assert_eq!(output_of("print false and (1/0); print true or (1/0);"), vec!["false", "true"]);
        assert_eq!(
            output_of("print nil or \"x\"; print 1 and 2; print nil and 1; print false or nil;"),
            vec!["x", "2", "nil", "nil"]
        );
        assert_eq!(output_of("var a = 0; true or (a = 1); false and (a = 2); print a;"), vec!["0"]);
    }

    #[test]
    fn scope_shadowing() {
        assert_eq!(output_of("var a = 1; { var a = 2; print a; } print a;"), vec!["2", "1"]);
        assert_eq!(output_of("var a = 1; { a = 2; } print a;"), vec!["2"]);
        assert_eq!(output_of("var a = 1; var a = 2; print a;"), vec!["2"]);
        assert_eq!(output_of("var a; print a;"), vec!["nil"]);
    }

    #[test]
    fn assignment_is_an_expression() {
        assert_eq!(output_of("var a; print a = 3; print a;"), vec!["3", "3"]);
        assert_eq!(output_of("var a; var b; a = b = \"x\"; print a + b;"), vec!["xx"]);
    }

    #[test]
    fn undefined_variable() {
        let (output, errors) = run("\n\nprint b;");
        assert_eq!(output, Vec::<String>::new());
        assert_eq!(errors, vec!["[line 3] RuntimeError: Undefined variable 'b'."]);

        let (_, errors) = run("c = 1;");
        assert_eq!(errors, vec!["[line 1] RuntimeError: Undefined variable 'c'."]);

        let (_, errors) = run("{ var x = 1; }\nprint x;");
        assert_eq!(errors, vec!["[line 2] RuntimeError: Undefined variable 'x'."]);
    }

    #[test]
    fn runtime_errors_stop_execution() {
        let (output, errors) = run("print 1;\nprint 1 / 0;\nprint 2;");
        assert_eq!(output, vec!["1"]);
        assert_eq!(errors, vec!["[line 2] RuntimeError: Division by zero."]);

        assert_eq!(run("print 1 / 0;").0, Vec::<String>::new());
    }

    #[test]
    fn operand_type_errors() {
        let cases = [
            ("print 1 + \"a\";", "Operands must be two numbers or two strings."),
            ("print nil + nil;", "Operands must be two numbers or two strings."),
            ("print -\"a\";", "Operand must be a number."),
            ("print 1 < \"a\";", "Operands must be numbers."),
            ("print true * 2;", "Operands must be numbers."),
            ("print \"a\" - \"b\";", "Operands must be numbers."),
            ("print \"4\" / 2;", "Operands must be numbers."),
        ];

        for (source, message) in cases {
            let (output, errors) = run(source);
            assert!(output.is_empty(), "{source}");
            assert_eq!(errors, vec![format!("[line 1] RuntimeError: {message}")], "{source}");
        }
    }

    #[test]
    fn compile_errors_suppress_execution() {
        let mut interpreter = Interpreter::new();

        let mut output = Vec::new();
        let diagnostics = interpreter.run_source("1 + ;\nprint 2;", &mut output).unwrap();
        assert!(output.is_empty());
        assert_eq!(diagnostics.of_kind(DiagnosticKind::Compile).count(), 1);
        assert!(!diagnostics.had_runtime_error());

        assert_eq!(run_with(&mut interpreter, "print 2;"), (vec!["2".to_string()], vec![]));

        // Lexical errors count as compile errors too
        let (output, errors) = run("print 1; @");
        assert!(output.is_empty());
        assert_eq!(errors, vec!["[line 1] Error: Unexpected character."]);
    }

    #[test]
    fn control_flow() {
        assert_eq!(output_of("if (true) if (false) print 1; else print 2;"), vec!["2"]);
        assert_eq!(output_of("if (1 > 2) print \"yes\"; else print \"no\";"), vec!["no"]);
        assert_eq!(
            output_of("var i = 0; while (i < 3) { print i; i = i + 1; }"),
            vec!["0", "1", "2"]
        );
        assert_eq!(output_of("while (false) print 1;"), Vec::<String>::new());
    }

    #[test]
    fn globals_persist_across_runs() {
        let mut interpreter = Interpreter::new();
        assert_eq!(run_with(&mut interpreter, "var a = 1;"), (vec![], vec![]));
        assert_eq!(run_with(&mut interpreter, "a = a + 1; print a;").0, vec!["2"]);
    }

    #[test]
    fn frames_are_restored_after_runtime_errors() {
        let mut interpreter = Interpreter::new();
        let (_, errors) =
            run_with(&mut interpreter, "var a = 1; { var a = 2; { var b = 3; print -nil; } }");
        assert_eq!(errors, vec!["[line 1] RuntimeError: Operand must be a number."]);

        assert_eq!(interpreter.environment().current(), FrameId::GLOBAL);
        assert_eq!(interpreter.environment().depth(), 1);
        assert_eq!(run_with(&mut interpreter, "print a;").0, vec!["1"]);
    }

    #[test]
    fn parsed_statements_are_inspected_before_running() {
        let mut dumped = Vec::new();
        let mut output = Vec::new();
        let diagnostics = Interpreter::new()
            .run_source_with("print 1;\n1 + ;\nvar a = \"x\";", &mut output, |stmts| {
                dumped = stmts.iter().map(|stmt| parser::Placeholder(stmt).to_string()).collect();
            })
            .unwrap();

        assert_eq!(dumped, vec!["(print 1)", "<error>", "(var a \"x\")"]);
        assert!(diagnostics.had_compile_error());
        assert!(output.is_empty());
    }

    #[test]
    fn placeholders_are_skipped() {
        let stmts = vec![
            None,
            Some(Stmt::Print(Expr::Literal(Value::Number(1.0)))),
            Some(Stmt::Block(vec![None, Some(Stmt::Print(Expr::Literal(Value::from("x"))))])),
        ];

        let mut output = Vec::new();
        let mut diagnostics = Diagnostics::new();
        Interpreter::new().interpret(&stmts, &mut output, &mut diagnostics).unwrap();

        assert!(diagnostics.is_empty());
        assert_eq!(String::from_utf8(output).unwrap(), "1\nx\n");
    }
}
