use std::collections::HashMap;
use std::fmt;
use crate::core::parser::{Expr, NumberLit, Stmt};
use crate::core::scanner::Token;
use crate::core::types::{builtin_return_type, Qualifier, VarType};

#[derive(Debug, Clone, PartialEq)]
pub struct SemanticError {
    pub message: String,
    pub line: Option<usize>,
}

impl SemanticError {
    fn new(message: String, line: usize) -> Self {
        Self { message, line: Some(line) }
    }
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "Semantic error at line {}: {}", line, self.message),
            None => write!(f, "Semantic error: {}", self.message),
        }
    }
}

/// metadata tracked per declared variable
#[derive(Debug, Clone)]
struct VarInfo {
    var_type: VarType,
    qualifier: Qualifier,
    initialized: bool,
    used: bool,
    line: usize,
}

#[derive(Debug)]
pub struct Resolver<'a> {
    scopes: Vec<HashMap<&'a str, VarInfo>>,
    pub errors: Vec<SemanticError>,
    pub warnings: Vec<String>,
}

impl<'a> Resolver<'a> {
    pub fn new() -> Self {
        Resolver {
            scopes: vec![HashMap::new()],
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// resolve the program; analysis succeeded iff no errors were collected
    pub fn resolve(&mut self, stmts: &[Stmt<'a>]) -> bool {
        for stmt in stmts {
            self.resolve_stmt(stmt);
        }
        // the top-level scope ends with the program
        self.end_scope();
        self.errors.is_empty()
    }

    fn resolve_stmt(&mut self, stmt: &Stmt<'a>) {
        match stmt {
            Stmt::VarDecl { qualifier, name, init } => {
                let mut init_type = VarType::Unknown;
                if let Some(expr) = init {
                    self.resolve_expr(expr);
                    init_type = self.infer(expr);
                }
                self.declare(name, init_type, *qualifier, init.is_some());
            }
            Stmt::Assign { name, value } => self.resolve_assign(name, value),
            Stmt::Fn { name, params, body } => {
                // the name lives in the enclosing scope so recursive calls resolve
                self.declare(name, VarType::Function, Qualifier::Const, false);
                self.begin_scope();
                for param in params {
                    self.declare(param, VarType::Unknown, Qualifier::Let, true);
                }
                for stmt in body {
                    self.resolve_stmt(stmt);
                }
                self.end_scope();
            }
            Stmt::Return { value } => self.resolve_expr(value),
            Stmt::Call { callee, args } => self.resolve_call(callee, args),
        }
    }

    fn resolve_assign(&mut self, name: &Token<'a>, value: &Expr<'a>) {
        let target = match self.lookup(name.lexeme) {
            Some(info) => (info.qualifier, info.var_type),
            None => {
                self.errors.push(SemanticError::new(
                    format!("Variable '{}' not declared", name.lexeme),
                    name.line,
                ));
                return;
            }
        };
        match target.0 {
            Qualifier::Mut => {}
            Qualifier::Const => self.errors.push(SemanticError::new(
                format!("Cannot assign to const variable '{}'", name.lexeme),
                name.line,
            )),
            Qualifier::Let => self.errors.push(SemanticError::new(
                format!(
                    "Cannot assign to immutable variable '{}' (declared with '{}')",
                    name.lexeme,
                    target.0.as_str()
                ),
                name.line,
            )),
        }
        self.resolve_expr(value);
        let rhs_type = self.infer(value);
        if target.1 != VarType::Unknown && !target.1.accepts(rhs_type) {
            self.errors.push(SemanticError::new(
                format!(
                    "Type mismatch: cannot assign {} to {} variable '{}'",
                    rhs_type, target.1, name.lexeme
                ),
                name.line,
            ));
        }
        if let Some(info) = self.lookup(name.lexeme) {
            info.initialized = true;
        }
    }

    fn resolve_expr(&mut self, expr: &Expr<'a>) {
        match expr {
            Expr::Number { .. } | Expr::Str { .. } | Expr::Bool { .. } | Expr::Null => {}
            Expr::Var { name } => match self.lookup(name.lexeme) {
                None => self.errors.push(SemanticError::new(
                    format!("Variable '{}' not declared", name.lexeme),
                    name.line,
                )),
                Some(info) if !info.initialized => {
                    self.errors.push(SemanticError::new(
                        format!("Variable '{}' used before initialization", name.lexeme),
                        name.line,
                    ))
                }
                Some(_) => {}
            },
            Expr::Unary { operand, .. } => self.resolve_expr(operand),
            Expr::Binary { lhs, rhs, .. } => {
                self.resolve_expr(lhs);
                self.resolve_expr(rhs);
            }
            Expr::Call { callee, args } => self.resolve_call(callee, args),
        }
    }

    fn resolve_call(&mut self, callee: &Token<'a>, args: &[Expr<'a>]) {
        // built-ins with a signature are always legal; arity and argument
        // types of user-defined calls are checked at run time only
        if builtin_return_type(callee.lexeme).is_none() {
            let known = matches!(
                self.lookup(callee.lexeme),
                Some(info) if info.var_type == VarType::Function
            );
            if !known {
                self.errors.push(SemanticError::new(
                    format!("Unknown function '{}'", callee.lexeme),
                    callee.line,
                ));
            }
        }
        for arg in args {
            self.resolve_expr(arg);
        }
    }

    /// best-effort type inference, used only for the assignment
    /// compatibility diagnostic
    fn infer(&mut self, expr: &Expr<'a>) -> VarType {
        match expr {
            Expr::Number { value: NumberLit::Int(_) } => VarType::Int,
            Expr::Number { value: NumberLit::Float(_) } => VarType::Float,
            Expr::Str { .. } => VarType::Str,
            Expr::Bool { .. } => VarType::Bool,
            Expr::Null => VarType::Unknown,
            Expr::Var { name } => match self.lookup(name.lexeme) {
                Some(info) => info.var_type,
                None => VarType::Unknown,
            },
            Expr::Unary { operand, .. } => self.infer(operand),
            Expr::Binary { op, lhs, rhs } => {
                let left = self.infer(lhs);
                let right = self.infer(rhs);
                if op.lexeme == "+" && (left == VarType::Str || right == VarType::Str) {
                    VarType::Str
                } else if left == VarType::Float || right == VarType::Float {
                    VarType::Float
                } else if left == VarType::Int && right == VarType::Int {
                    VarType::Int
                } else {
                    VarType::Unknown
                }
            }
            Expr::Call { callee, .. } => {
                builtin_return_type(callee.lexeme).unwrap_or(VarType::Unknown)
            }
        }
    }

    fn declare(&mut self, name: &Token<'a>, var_type: VarType, qualifier: Qualifier, initialized: bool) {
        let scope = self.scopes.last_mut().expect("scope stack is never empty");
        if scope.contains_key(name.lexeme) {
            self.errors.push(SemanticError::new(
                format!("Variable '{}' already declared in this scope", name.lexeme),
                name.line,
            ));
            return;
        }
        scope.insert(
            name.lexeme,
            VarInfo {
                var_type,
                qualifier,
                initialized,
                used: false,
                line: name.line,
            },
        );
    }

    /// look a name up from the innermost scope outward, marking it used
    fn lookup(&mut self, name: &str) -> Option<&mut VarInfo> {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(info) = scope.get_mut(name) {
                info.used = true;
                return Some(info);
            }
        }
        None
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// pop the current scope, warning about its unused names first
    fn end_scope(&mut self) {
        if let Some(scope) = self.scopes.pop() {
            let mut unused: Vec<(&str, usize)> = scope
                .iter()
                .filter(|(name, info)| !info.used && **name != "_")
                .map(|(name, info)| (*name, info.line))
                .collect();
            unused.sort_by_key(|&(name, line)| (line, name));
            for (name, line) in unused {
                self.warnings.push(format!(
                    "Warning at line {}: Variable '{}' declared but never used",
                    line, name
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::Parser;
    use crate::core::scanner::Scanner;

    fn analyze(input: &str) -> (Vec<SemanticError>, Vec<String>) {
        let tokens = Scanner::new(input).start().unwrap();
        let stmts = Parser::new(&tokens).start().unwrap();
        let mut resolver = Resolver::new();
        resolver.resolve(&stmts);
        (resolver.errors, resolver.warnings)
    }

    fn messages(input: &str) -> Vec<String> {
        analyze(input).0.into_iter().map(|e| e.message).collect()
    }

    #[test]
    fn let_without_reassignment_is_clean() {
        let (errors, _) = analyze("let x = 1; print(x);");
        assert!(errors.is_empty());
    }

    #[test]
    fn assignment_to_let_variable() {
        assert_eq!(
            messages("let x = 1; x = 2;"),
            vec!["Cannot assign to immutable variable 'x' (declared with 'let')"]
        );
    }

    #[test]
    fn assignment_to_const_variable() {
        assert_eq!(
            messages("const x = 1; x = 2;"),
            vec!["Cannot assign to const variable 'x'"]
        );
    }

    #[test]
    fn mut_variable_may_be_reassigned() {
        let (errors, _) = analyze("mut x = 1; x = 2; print(x);");
        assert!(errors.is_empty());
    }

    #[test]
    fn assignment_to_undeclared_variable() {
        assert_eq!(messages("x = 1;"), vec!["Variable 'x' not declared"]);
    }

    #[test]
    fn read_of_undeclared_variable() {
        assert_eq!(messages("print(y);"), vec!["Variable 'y' not declared"]);
    }

    #[test]
    fn read_before_initialization() {
        assert_eq!(
            messages("let x; print(x);"),
            vec!["Variable 'x' used before initialization"]
        );
    }

    #[test]
    fn assignment_initializes_a_mut_declaration() {
        let (errors, _) = analyze("mut x; x = 1; print(x);");
        assert!(errors.is_empty());
    }

    #[test]
    fn duplicate_declaration_in_same_scope() {
        assert_eq!(
            messages("let x = 1; let x = 2; print(x);"),
            vec!["Variable 'x' already declared in this scope"]
        );
    }

    #[test]
    fn shadowing_an_outer_name_is_allowed() {
        let (errors, _) = analyze("let x = 1; fn f() { let x = 2; print(x); } f(); print(x);");
        assert!(errors.is_empty());
    }

    #[test]
    fn string_into_int_variable_is_a_type_error() {
        assert_eq!(
            messages("mut x = 1; x = \"a\"; print(x);"),
            vec!["Type mismatch: cannot assign string to int variable 'x'"]
        );
    }

    #[test]
    fn float_into_int_variable_is_a_type_error() {
        assert_eq!(
            messages("mut x = 1; x = 2.5; print(x);"),
            vec!["Type mismatch: cannot assign float to int variable 'x'"]
        );
    }

    #[test]
    fn int_into_float_variable_is_compatible() {
        let (errors, _) = analyze("mut x = 1.5; x = 2; print(x);");
        assert!(errors.is_empty());
    }

    #[test]
    fn builtin_return_types_feed_inference() {
        // input yields a string, which cannot land in an int variable
        assert_eq!(
            messages("mut x = 1; x = len(\"ab\"); x = to_int(\"3\"); print(x);"),
            Vec::<String>::new()
        );
        assert_eq!(
            messages("mut x = 1; x = to_string(2); print(x);"),
            vec!["Type mismatch: cannot assign string to int variable 'x'"]
        );
    }

    #[test]
    fn user_call_result_is_unknown_and_rejected_for_typed_targets() {
        assert_eq!(
            messages("fn f() { return 1; } mut x = 1; x = f(); print(x);"),
            vec!["Type mismatch: cannot assign unknown to int variable 'x'"]
        );
    }

    #[test]
    fn unknown_function_call() {
        assert_eq!(messages("foo();"), vec!["Unknown function 'foo'"]);
        // scanner-recognized built-ins without a signature behave the same
        assert_eq!(messages("push(1);"), vec!["Unknown function 'push'"]);
    }

    #[test]
    fn builtins_are_always_legal() {
        let (errors, _) = analyze("print(1); assert(true);");
        assert!(errors.is_empty());
    }

    #[test]
    fn recursive_calls_resolve() {
        let (errors, _) = analyze(
            "fn fact(n) { return n * fact(n - 1); } print(fact(5));",
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn user_call_arity_is_not_checked_here() {
        let (errors, _) = analyze("fn f(a, b) { return a + b; } print(f(1));");
        assert!(errors.is_empty());
    }

    #[test]
    fn unused_variable_warning() {
        let (errors, warnings) = analyze("let x = 1;");
        assert!(errors.is_empty());
        assert_eq!(
            warnings,
            vec!["Warning at line 1: Variable 'x' declared but never used"]
        );
    }

    #[test]
    fn underscore_is_exempt_from_unused_warnings() {
        let (_, warnings) = analyze("let _ = 1;");
        assert!(warnings.is_empty());
    }

    #[test]
    fn unused_parameter_warning() {
        let (_, warnings) = analyze("fn f(a, b) { return a; } print(f(1, 2));");
        assert_eq!(
            warnings,
            vec!["Warning at line 1: Variable 'b' declared but never used"]
        );
    }

    #[test]
    fn errors_accumulate_across_the_whole_pass() {
        let msgs = messages("x = 1; let y = 1; y = 2; print(z);");
        assert_eq!(msgs.len(), 3);
    }
}
