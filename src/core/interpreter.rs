use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::rc::Rc;
use crate::core::eval::EvalRef;
use crate::core::memory::{Binding, Function, Memory, ObjId, RuntimeError, Value};
use crate::core::parser::{Expr, Stmt};
use crate::core::scanner::Token;

/// how a statement finished: fell through, or hit a `return`
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Returning(Value),
}

type BuiltinFn<'a> = fn(&mut Memory<'a>, Vec<Value>) -> Result<Option<ObjId>, RuntimeError>;

#[derive(Debug)]
pub struct Interpreter<'a> {
    // program memory
    pub memory: Memory<'a>,
    // fixed native dispatch table, built once per session
    builtins: HashMap<&'static str, BuiltinFn<'a>>,
}

impl<'a> Interpreter<'a> {
    pub fn new() -> Self {
        let mut builtins: HashMap<&'static str, BuiltinFn<'a>> = HashMap::new();
        builtins.insert("print", builtin_print);
        builtins.insert("input", builtin_input);
        builtins.insert("to_int", builtin_to_int);
        builtins.insert("to_float", builtin_to_float);
        builtins.insert("to_string", builtin_to_string);
        builtins.insert("abs", builtin_abs);
        builtins.insert("min", builtin_min);
        builtins.insert("max", builtin_max);
        builtins.insert("sqrt", builtin_sqrt);
        builtins.insert("pow", builtin_pow);
        builtins.insert("len", builtin_len);
        builtins.insert("assert", builtin_assert);
        builtins.insert("panic", builtin_panic);
        Self {
            memory: Memory::new(),
            builtins,
        }
    }

    pub fn start(&mut self, program: &'a [Stmt<'a>]) -> Result<(), RuntimeError> {
        for stmt in program {
            if let Flow::Returning(_) = self.statement(stmt)? {
                return Err(RuntimeError::new("return outside of a function"));
            }
        }
        Ok(())
    }

    pub fn statement(&mut self, stmt: &'a Stmt<'a>) -> Result<Flow, RuntimeError> {
        match stmt {
            Stmt::VarDecl { name, init, .. } => {
                match init {
                    Some(expr) => match self.eval(expr)? {
                        Some(slot) => {
                            // retain for the binding, then drop the temporary
                            self.memory.retain(slot.id)?;
                            self.memory.declare(name.lexeme, Binding::Object(slot.id))?;
                            self.dispose(slot)?;
                        }
                        None => self.memory.declare(name.lexeme, Binding::Empty)?,
                    },
                    None => self.memory.declare(name.lexeme, Binding::Empty)?,
                }
                Ok(Flow::Normal)
            }
            Stmt::Assign { name, value } => {
                match self.eval(value)? {
                    Some(slot) => {
                        self.memory.assign(name.lexeme, Some(slot.id))?;
                        self.dispose(slot)?;
                    }
                    None => self.memory.assign(name.lexeme, None)?,
                }
                Ok(Flow::Normal)
            }
            Stmt::Fn { name, params, body } => {
                let function = Function {
                    name: name.lexeme,
                    params: params.iter().map(|p| p.lexeme).collect(),
                    body,
                };
                self.memory
                    .declare(name.lexeme, Binding::Function(Rc::new(function)))?;
                Ok(Flow::Normal)
            }
            Stmt::Return { value } => {
                let value = self.eval_value(value)?;
                Ok(Flow::Returning(value))
            }
            Stmt::Call { callee, args } => {
                if let Some(slot) = self.call(callee, args)? {
                    self.dispose(slot)?;
                }
                Ok(Flow::Normal)
            }
        }
    }

    /// evaluates a call; arguments are dereferenced left to right before the
    /// callee is even resolved, matching statement order semantics
    pub(crate) fn call(
        &mut self,
        callee: &Token<'a>,
        args: &'a [Expr<'a>],
    ) -> Result<Option<EvalRef>, RuntimeError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_value(arg)?);
        }

        if let Some(builtin) = self.builtins.get(callee.lexeme) {
            let builtin = *builtin;
            let result = builtin(&mut self.memory, values)?;
            return Ok(result.map(EvalRef::owned));
        }

        let function = match self.memory.lookup(callee.lexeme) {
            Some(Binding::Function(function)) => Rc::clone(function),
            Some(_) => {
                return Err(RuntimeError::new(format!(
                    "'{}' is not a function",
                    callee.lexeme
                )))
            }
            None => {
                return Err(RuntimeError::new(format!(
                    "Variable '{}' not defined",
                    callee.lexeme
                )))
            }
        };

        if function.params.len() != values.len() {
            return Err(RuntimeError::new(format!(
                "{} expects {} args, got {}",
                function.name,
                function.params.len(),
                values.len()
            )));
        }

        self.memory.push_frame();
        for (param, value) in function.params.iter().zip(values) {
            let id = self.memory.allocate(value);
            self.memory.declare(*param, Binding::Object(id))?;
        }

        // the frame pop is the one mandatory cleanup step and happens on
        // every exit path, early return or fallthrough or failure
        let outcome = self.run_body(function.body);
        let popped = self.memory.pop_frame();
        let returned = outcome?;
        popped?;

        // a returned value is re-materialized in the caller's scope; the
        // callee-local id it came from died with the frame
        Ok(returned.map(|value| EvalRef::owned(self.memory.allocate(value))))
    }

    fn run_body(&mut self, body: &'a [Stmt<'a>]) -> Result<Option<Value>, RuntimeError> {
        for stmt in body {
            if let Flow::Returning(value) = self.statement(stmt)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

//
// built-in functions
//

fn expect_args(name: &str, args: &[Value], count: usize) -> Result<(), RuntimeError> {
    if args.len() != count {
        return Err(RuntimeError::new(format!(
            "{} expects {} argument{}, got {}",
            name,
            count,
            if count == 1 { "" } else { "s" },
            args.len()
        )));
    }
    Ok(())
}

fn as_number(name: &str, value: &Value) -> Result<f64, RuntimeError> {
    match value {
        Value::Int(a) => Ok(*a as f64),
        Value::Float(a) => Ok(*a),
        other => Err(RuntimeError::new(format!(
            "{} expects a number, got {}",
            name,
            other.kind()
        ))),
    }
}

fn builtin_print<'a>(_mem: &mut Memory<'a>, args: Vec<Value>) -> Result<Option<ObjId>, RuntimeError> {
    let line = args
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    println!("{}", line);
    Ok(None)
}

fn builtin_input<'a>(mem: &mut Memory<'a>, args: Vec<Value>) -> Result<Option<ObjId>, RuntimeError> {
    if args.len() > 1 {
        return Err(RuntimeError::new(format!(
            "input expects at most 1 argument, got {}",
            args.len()
        )));
    }
    if let Some(prompt) = args.first() {
        print!("{}", prompt);
        std::io::stdout()
            .flush()
            .map_err(|err| RuntimeError::new(format!("failed to flush stdout: {}", err)))?;
    }
    let mut buf = String::new();
    let read = std::io::stdin()
        .lock()
        .read_line(&mut buf)
        .map_err(|err| RuntimeError::new(format!("failed to read input: {}", err)))?;
    if read == 0 {
        return Err(RuntimeError::new("end of input"));
    }
    while buf.ends_with('\n') || buf.ends_with('\r') {
        buf.pop();
    }
    Ok(Some(mem.allocate(Value::Str(buf))))
}

fn builtin_to_int<'a>(mem: &mut Memory<'a>, args: Vec<Value>) -> Result<Option<ObjId>, RuntimeError> {
    expect_args("to_int", &args, 1)?;
    let value = match &args[0] {
        Value::Int(a) => *a,
        Value::Float(a) => a.trunc() as i64,
        Value::Bool(b) => *b as i64,
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| RuntimeError::new(format!("cannot convert '{}' to int", s)))?,
        Value::Null => return Err(RuntimeError::new("cannot convert null to int")),
    };
    Ok(Some(mem.allocate(Value::Int(value))))
}

fn builtin_to_float<'a>(mem: &mut Memory<'a>, args: Vec<Value>) -> Result<Option<ObjId>, RuntimeError> {
    expect_args("to_float", &args, 1)?;
    let value = match &args[0] {
        Value::Int(a) => *a as f64,
        Value::Float(a) => *a,
        Value::Bool(b) => *b as i64 as f64,
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| RuntimeError::new(format!("cannot convert '{}' to float", s)))?,
        Value::Null => return Err(RuntimeError::new("cannot convert null to float")),
    };
    Ok(Some(mem.allocate(Value::Float(value))))
}

fn builtin_to_string<'a>(mem: &mut Memory<'a>, args: Vec<Value>) -> Result<Option<ObjId>, RuntimeError> {
    expect_args("to_string", &args, 1)?;
    Ok(Some(mem.allocate(Value::Str(args[0].to_string()))))
}

fn builtin_abs<'a>(mem: &mut Memory<'a>, args: Vec<Value>) -> Result<Option<ObjId>, RuntimeError> {
    expect_args("abs", &args, 1)?;
    let value = match &args[0] {
        Value::Int(a) => Value::Int(a.abs()),
        Value::Float(a) => Value::Float(a.abs()),
        other => {
            return Err(RuntimeError::new(format!(
                "abs expects a number, got {}",
                other.kind()
            )))
        }
    };
    Ok(Some(mem.allocate(value)))
}

fn pick_extreme<'a>(
    name: &str,
    mem: &mut Memory<'a>,
    args: Vec<Value>,
    prefer_greater: bool,
) -> Result<Option<ObjId>, RuntimeError> {
    if args.is_empty() {
        return Err(RuntimeError::new(format!(
            "{} expects at least one argument",
            name
        )));
    }
    let mut best = args[0].clone();
    let mut best_key = as_number(name, &best)?;
    for value in &args[1..] {
        let key = as_number(name, value)?;
        if (prefer_greater && key > best_key) || (!prefer_greater && key < best_key) {
            best = value.clone();
            best_key = key;
        }
    }
    Ok(Some(mem.allocate(best)))
}

fn builtin_min<'a>(mem: &mut Memory<'a>, args: Vec<Value>) -> Result<Option<ObjId>, RuntimeError> {
    pick_extreme("min", mem, args, false)
}

fn builtin_max<'a>(mem: &mut Memory<'a>, args: Vec<Value>) -> Result<Option<ObjId>, RuntimeError> {
    pick_extreme("max", mem, args, true)
}

fn builtin_sqrt<'a>(mem: &mut Memory<'a>, args: Vec<Value>) -> Result<Option<ObjId>, RuntimeError> {
    expect_args("sqrt", &args, 1)?;
    let value = as_number("sqrt", &args[0])?;
    if value < 0.0 {
        return Err(RuntimeError::new("sqrt of a negative number"));
    }
    Ok(Some(mem.allocate(Value::Float(value.sqrt()))))
}

fn builtin_pow<'a>(mem: &mut Memory<'a>, args: Vec<Value>) -> Result<Option<ObjId>, RuntimeError> {
    expect_args("pow", &args, 2)?;
    let value = match (&args[0], &args[1]) {
        (Value::Int(base), Value::Int(exp)) if *exp >= 0 && *exp <= u32::MAX as i64 => base
            .checked_pow(*exp as u32)
            .map(Value::Int)
            .ok_or_else(|| RuntimeError::new("integer overflow in pow"))?,
        (lhs, rhs) => {
            let base = as_number("pow", lhs)?;
            let exp = as_number("pow", rhs)?;
            Value::Float(base.powf(exp))
        }
    };
    Ok(Some(mem.allocate(value)))
}

fn builtin_len<'a>(mem: &mut Memory<'a>, args: Vec<Value>) -> Result<Option<ObjId>, RuntimeError> {
    expect_args("len", &args, 1)?;
    match &args[0] {
        Value::Str(s) => Ok(Some(mem.allocate(Value::Int(s.chars().count() as i64)))),
        other => Err(RuntimeError::new(format!(
            "len expects a string, got {}",
            other.kind()
        ))),
    }
}

fn builtin_assert<'a>(_mem: &mut Memory<'a>, args: Vec<Value>) -> Result<Option<ObjId>, RuntimeError> {
    expect_args("assert", &args, 1)?;
    if !args[0].is_truthy() {
        return Err(RuntimeError::new("Assertion failed"));
    }
    Ok(None)
}

fn builtin_panic<'a>(_mem: &mut Memory<'a>, args: Vec<Value>) -> Result<Option<ObjId>, RuntimeError> {
    expect_args("panic", &args, 1)?;
    Err(RuntimeError::new(args[0].to_string()))
}
