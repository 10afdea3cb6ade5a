use crate::core::interpreter::Interpreter;
use crate::core::memory::{Binding, ObjId, RuntimeError, Value};
use crate::core::parser::{Expr, NumberLit};

/// an evaluated expression: a heap id plus whether the evaluator owns the
/// reference (a temporary) or borrows it from an environment binding
#[derive(Debug, Clone, Copy)]
pub struct EvalRef {
    pub id: ObjId,
    owned: bool,
}

impl EvalRef {
    pub(crate) fn owned(id: ObjId) -> Self {
        Self { id, owned: true }
    }

    pub(crate) fn borrowed(id: ObjId) -> Self {
        Self { id, owned: false }
    }
}

impl<'a> Interpreter<'a> {
    /// evaluate an expression; `None` means it produced no value (a call to
    /// a void built-in, or a read of a binding that has no value yet)
    pub(crate) fn eval(&mut self, expr: &'a Expr<'a>) -> Result<Option<EvalRef>, RuntimeError> {
        match expr {
            Expr::Number { value: NumberLit::Int(a) } => {
                Ok(Some(EvalRef::owned(self.memory.allocate(Value::Int(*a)))))
            }
            Expr::Number { value: NumberLit::Float(a) } => {
                Ok(Some(EvalRef::owned(self.memory.allocate(Value::Float(*a)))))
            }
            Expr::Str { raw } => {
                let value = Value::Str(unescape(raw));
                Ok(Some(EvalRef::owned(self.memory.allocate(value))))
            }
            Expr::Bool { value } => {
                Ok(Some(EvalRef::owned(self.memory.allocate(Value::Bool(*value)))))
            }
            Expr::Null => Ok(Some(EvalRef::owned(self.memory.allocate(Value::Null)))),
            Expr::Var { name } => match self.memory.lookup(name.lexeme) {
                Some(Binding::Object(id)) => Ok(Some(EvalRef::borrowed(*id))),
                Some(Binding::Empty) => Ok(None),
                Some(Binding::Function(_)) => Err(RuntimeError::new(format!(
                    "'{}' is not a value",
                    name.lexeme
                ))),
                None => Err(RuntimeError::new(format!(
                    "Variable '{}' not defined",
                    name.lexeme
                ))),
            },
            Expr::Unary { op, operand } => {
                let value = self.eval_value(operand)?;
                let result = eval_unary(op.lexeme, &value)?;
                Ok(Some(EvalRef::owned(self.memory.allocate(result))))
            }
            Expr::Binary { op, lhs, rhs } => {
                // operands evaluate left to right, both unconditionally
                let left = self.eval_value(lhs)?;
                let right = self.eval_value(rhs)?;
                let result = eval_binary(op.lexeme, &left, &right)?;
                Ok(Some(EvalRef::owned(self.memory.allocate(result))))
            }
            Expr::Call { callee, args } => self.call(callee, args),
        }
    }

    /// evaluate to a dereferenced value, releasing any temporary
    pub(crate) fn eval_value(&mut self, expr: &'a Expr<'a>) -> Result<Value, RuntimeError> {
        match self.eval(expr)? {
            Some(slot) => {
                let value = self.memory.get(slot.id)?.clone();
                self.dispose(slot)?;
                Ok(value)
            }
            None => Err(RuntimeError::new("expression produced no value")),
        }
    }

    /// release an owned temporary; borrowed references are left alone
    pub(crate) fn dispose(&mut self, slot: EvalRef) -> Result<(), RuntimeError> {
        if slot.owned {
            self.memory.release(slot.id)?;
        }
        Ok(())
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('0') => out.push('\0'),
            // unknown escapes are kept verbatim
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Int(a) => Some(*a as f64),
        Value::Float(a) => Some(*a),
        _ => None,
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    use Value::*;
    match (lhs, rhs) {
        (Int(a), Int(b)) => a == b,
        (Float(a), Float(b)) => a == b,
        (Int(a), Float(b)) | (Float(b), Int(a)) => *a as f64 == *b,
        (Str(a), Str(b)) => a == b,
        (Bool(a), Bool(b)) => a == b,
        (Null, Null) => true,
        _ => false,
    }
}

fn unsupported(op: &str, lhs: &Value, rhs: &Value) -> RuntimeError {
    RuntimeError::new(format!(
        "unsupported operand types for '{}': {} and {}",
        op,
        lhs.kind(),
        rhs.kind()
    ))
}

/// evaluate a unary operation; increment and decrement produce a new value
/// without touching any binding
fn eval_unary(op: &str, value: &Value) -> Result<Value, RuntimeError> {
    use Value::*;
    Ok(match (op, value) {
        ("+", Int(a)) => Int(*a),
        ("+", Float(a)) => Float(*a),
        ("-", Int(a)) => Int(-a),
        ("-", Float(a)) => Float(-a),
        ("!", v) => Bool(!v.is_truthy()),
        ("++", Int(a)) => Int(a + 1),
        ("++", Float(a)) => Float(a + 1.0),
        ("--", Int(a)) => Int(a - 1),
        ("--", Float(a)) => Float(a - 1.0),
        _ => {
            return Err(RuntimeError::new(format!(
                "unsupported operand type for unary '{}': {}",
                op,
                value.kind()
            )))
        }
    })
}

/// the closed table of legal (operator, kinds) combinations; anything
/// outside it is a runtime error naming the operator and both kinds
fn eval_binary(op: &str, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    use Value::*;
    Ok(match op {
        "+" => match (lhs, rhs) {
            (Int(a), Int(b)) => Int(a + b),
            (Int(a), Float(b)) => Float(*a as f64 + b),
            (Float(a), Int(b)) => Float(a + *b as f64),
            (Float(a), Float(b)) => Float(a + b),
            (Str(a), Str(b)) => Str(format!("{}{}", a, b)),
            _ => return Err(unsupported(op, lhs, rhs)),
        },
        "-" => match (lhs, rhs) {
            (Int(a), Int(b)) => Int(a - b),
            (Int(a), Float(b)) => Float(*a as f64 - b),
            (Float(a), Int(b)) => Float(a - *b as f64),
            (Float(a), Float(b)) => Float(a - b),
            _ => return Err(unsupported(op, lhs, rhs)),
        },
        "*" => match (lhs, rhs) {
            (Int(a), Int(b)) => Int(a * b),
            (Int(a), Float(b)) => Float(*a as f64 * b),
            (Float(a), Int(b)) => Float(a * *b as f64),
            (Float(a), Float(b)) => Float(a * b),
            _ => return Err(unsupported(op, lhs, rhs)),
        },
        "/" => {
            let (a, b) = match (numeric(lhs), numeric(rhs)) {
                (Some(a), Some(b)) => (a, b),
                _ => return Err(unsupported(op, lhs, rhs)),
            };
            if b == 0.0 {
                return Err(RuntimeError::new("division by zero"));
            }
            // division always yields a float, even on two ints
            Float(a / b)
        }
        "%" => match (lhs, rhs) {
            (Int(a), Int(b)) => {
                if *b == 0 {
                    return Err(RuntimeError::new("modulo by zero"));
                }
                Int(a % b)
            }
            (lhs, rhs) => {
                let (a, b) = match (numeric(lhs), numeric(rhs)) {
                    (Some(a), Some(b)) => (a, b),
                    _ => return Err(unsupported(op, lhs, rhs)),
                };
                if b == 0.0 {
                    return Err(RuntimeError::new("modulo by zero"));
                }
                Float(a % b)
            }
        },
        "==" => Bool(values_equal(lhs, rhs)),
        "!=" => Bool(!values_equal(lhs, rhs)),
        "<" | ">" | "<=" | ">=" => {
            let ordering = match (lhs, rhs) {
                (Str(a), Str(b)) => a.partial_cmp(b),
                (lhs, rhs) => match (numeric(lhs), numeric(rhs)) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => return Err(unsupported(op, lhs, rhs)),
                },
            };
            let ordering = match ordering {
                Some(ordering) => ordering,
                None => return Err(unsupported(op, lhs, rhs)),
            };
            Bool(match op {
                "<" => ordering.is_lt(),
                ">" => ordering.is_gt(),
                "<=" => ordering.is_le(),
                _ => ordering.is_ge(),
            })
        }
        // logical operators coerce to truthiness; both sides were already
        // evaluated, there is no short-circuit
        "&&" => Bool(lhs.is_truthy() && rhs.is_truthy()),
        "||" => Bool(lhs.is_truthy() || rhs.is_truthy()),
        _ => return Err(RuntimeError::new(format!("Unknown operator {}", op))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::Parser;
    use crate::core::resolver::Resolver;
    use crate::core::scanner::Scanner;

    /// run a program through the full pipeline; reports the outcome plus
    /// the final frame count and heap population for invariant checks
    fn run_program(input: &str) -> (Result<(), RuntimeError>, usize, usize) {
        let tokens = Scanner::new(input).start().unwrap();
        let program = Parser::new(&tokens).start().unwrap();
        let mut resolver = Resolver::new();
        assert!(resolver.resolve(&program), "analysis failed: {:?}", resolver.errors);
        let mut interpreter = Interpreter::new();
        let result = interpreter.start(&program);
        let frames = interpreter.memory.frame_count();
        let heap = interpreter.memory.heap_len();
        (result, frames, heap)
    }

    fn run_ok(input: &str) {
        run_program(input).0.unwrap();
    }

    fn run_err(input: &str) -> RuntimeError {
        let tokens = Scanner::new(input).start().unwrap();
        let program = Parser::new(&tokens).start().unwrap();
        let mut interpreter = Interpreter::new();
        interpreter.start(&program).unwrap_err()
    }

    #[test]
    fn arithmetic_precedence_and_associativity() {
        run_ok("assert(2 + 3 * 4 == 14);");
        run_ok("assert(10 - 2 - 3 == 5);");
        run_ok("assert(1 || 0 && 0);");
        run_ok("assert((2 + 3) * 4 == 20);");
    }

    #[test]
    fn division_yields_floats() {
        run_ok("assert(10 / 4 == 2.5);");
        run_ok("assert(10 / 2 == 5);");
        run_ok("assert(7 % 3 == 1);");
    }

    #[test]
    fn mixed_numeric_arithmetic_promotes_to_float() {
        run_ok("assert(1 + 2.5 == 3.5);");
        run_ok("assert(2.0 * 3 == 6);");
    }

    #[test]
    fn string_concatenation_and_comparison() {
        run_ok("assert(\"foo\" + \"bar\" == \"foobar\");");
        run_ok("assert(\"abc\" < \"abd\");");
        run_ok("assert(\"a\" != \"b\");");
    }

    #[test]
    fn equality_crosses_int_and_float_only() {
        run_ok("assert(3 == 3.0);");
        run_ok("assert(1 != \"1\");");
        run_ok("assert(null == null);");
    }

    #[test]
    fn unary_operators() {
        run_ok("assert(-5 + 6 == 1);");
        run_ok("assert(++5 == 6);");
        run_ok("assert(--5 == 4);");
        run_ok("assert(!0);");
        run_ok("assert(!\"\");");
        run_ok("let x = 3; assert(!(!x));");
    }

    #[test]
    fn increment_does_not_mutate_the_binding() {
        run_ok("let x = 1; let y = ++x; assert(y == 2); assert(x == 1);");
    }

    #[test]
    fn logical_operators_evaluate_both_sides() {
        run_ok(
            "mut n = 0; fn bump() { n = 1; return 1; } \
             let r = 0 && bump(); assert(n == 1); assert(!r);",
        );
    }

    #[test]
    fn string_escapes_are_materialized() {
        run_ok("assert(len(\"a\\nb\") == 3);");
        run_ok("assert(\"q\\\"q\" == 'q\"q');");
    }

    #[test]
    fn declaration_and_mutation() {
        run_ok("mut x = 1; x = 2; assert(x == 2);");
        run_ok("mut s = \"a\"; s = s + \"b\"; assert(s == \"ab\");");
    }

    #[test]
    fn function_calls() {
        run_ok("fn add(a, b) { return a + b; } assert(add(2, 3) == 5);");
        run_ok("fn inc(a) { return a + 1; } assert(inc(inc(1)) == 3);");
        run_ok(
            "mut acc = 1; mut i = 1; fn step() { acc = acc * i; i = i + 1; return acc; } \
             step(); step(); step(); assert(acc == 6);",
        );
    }

    #[test]
    fn function_without_return_yields_no_value() {
        run_ok("fn noop(a) { print(a); } noop(1);");
        // the binding exists but holds nothing, so reading it fails
        let err = run_err("fn noop() { print(0); } let x = noop(); print(x);");
        assert_eq!(err.message, "expression produced no value");
    }

    #[test]
    fn frame_count_is_restored_after_calls() {
        let (result, frames, _) =
            run_program("fn add(a, b) { return a + b; } let r = add(2, 3); assert(r == 5);");
        result.unwrap();
        assert_eq!(frames, 1);
    }

    #[test]
    fn heap_holds_exactly_the_reachable_values() {
        let (result, frames, heap) =
            run_program("mut x = 1; x = 2; fn f(a) { return a + 1; } let y = f(3); print(y);");
        result.unwrap();
        // two live bindings (x and y), nothing else
        assert_eq!(heap, 2);
        assert_eq!(frames, 1);
    }

    #[test]
    fn temporaries_do_not_leak() {
        let (result, _, heap) = run_program(
            "let x = (1 + 2) * (3 + 4); assert(x == 21); assert(to_string(x) == \"21\");",
        );
        result.unwrap();
        assert_eq!(heap, 1);
    }

    #[test]
    fn locals_die_with_their_frame() {
        let (result, _, heap) =
            run_program("fn f() { let big = \"local\"; return 1; } let r = f(); assert(r == 1);");
        result.unwrap();
        assert_eq!(heap, 1);
    }

    #[test]
    fn incompatible_operands_fail_at_runtime() {
        let err = run_err("let x = 1 + \"a\"; print(x);");
        assert_eq!(err.message, "unsupported operand types for '+': int and string");
        let err = run_err("let x = null < 1; print(x);");
        assert_eq!(err.message, "unsupported operand types for '<': null and int");
    }

    #[test]
    fn division_by_zero() {
        assert_eq!(run_err("let x = 1 / 0; print(x);").message, "division by zero");
        assert_eq!(run_err("let x = 1 % 0; print(x);").message, "modulo by zero");
    }

    #[test]
    fn arity_is_checked_at_call_time() {
        let err = run_err("fn f(a) { return a; } f(1, 2);");
        assert_eq!(err.message, "f expects 1 args, got 2");
    }

    #[test]
    fn calling_a_non_function_value() {
        let err = run_err("let f = 1; f(2);");
        assert_eq!(err.message, "'f' is not a function");
    }

    #[test]
    fn return_at_the_top_level_fails() {
        let err = run_err("return 1;");
        assert_eq!(err.message, "return outside of a function");
    }

    #[test]
    fn panic_aborts_with_its_message() {
        let err = run_err("panic(\"boom\"); print(1);");
        assert_eq!(err.message, "boom");
    }

    #[test]
    fn assert_fails_on_falsy_values() {
        assert_eq!(run_err("assert(0);").message, "Assertion failed");
        assert_eq!(run_err("assert(\"\");").message, "Assertion failed");
        run_ok("assert(1); assert(\"x\"); assert(true);");
    }

    #[test]
    fn conversion_builtins() {
        run_ok("assert(to_int(\"42\") == 42);");
        run_ok("assert(to_int(3.9) == 3);");
        run_ok("assert(to_int(true) == 1);");
        run_ok("assert(to_float(2) == 2.0);");
        run_ok("assert(to_string(12) == \"12\");");
        run_ok("assert(to_string(3.0) == \"3.0\");");
        run_ok("assert(to_string(true) == \"true\");");
        assert_eq!(
            run_err("to_int(\"abc\");").message,
            "cannot convert 'abc' to int"
        );
    }

    #[test]
    fn numeric_builtins() {
        run_ok("assert(abs(-3) == 3);");
        run_ok("assert(abs(2.5) == 2.5);");
        run_ok("assert(min(3, 1, 2) == 1);");
        run_ok("assert(max(3, 1, 2) == 3);");
        run_ok("assert(min(1, 0.5) == 0.5);");
        run_ok("assert(sqrt(9) == 3.0);");
        run_ok("assert(pow(2, 10) == 1024);");
        run_ok("assert(pow(2.0, 3) == 8.0);");
        run_ok("assert(len(\"hello\") == 5);");
        assert_eq!(run_err("sqrt(0 - 1);").message, "sqrt of a negative number");
    }

    #[test]
    fn unescape_keeps_unknown_sequences() {
        assert_eq!(unescape("a\\nb"), "a\nb");
        assert_eq!(unescape("a\\qb"), "a\\qb");
        assert_eq!(unescape("tail\\"), "tail\\");
    }
}
