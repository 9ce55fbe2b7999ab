//! The parser: a recursive-descent statement grammar on top of an
//! operator-precedence (shunting-yard) expression parser.
//!
//! Expressions are parsed with two stacks, operators and operands, against
//! the standard precedence table (negative values mark right-associative
//! levels). Prefix operators push a hole operand; `++`/`--`/`+`/`-` are
//! rewritten to their prefix or postfix forms depending on position before
//! reduction. Parenthesis-like and dot-like operators are handled
//! structurally at the top of the loop, which is also where argument lists
//! and member names are read.
//!
//! Automatic semicolon insertion: `return`, `break`, `continue` and the
//! postfix `++`/`--` forms all terminate at a newline.

use crate::{
    error::{CodeLoc, ParseError},
    expr::{Expr, ExprKind, FunctionNode, IdentNode, ObjEntry, make_binary},
    intern::StringId,
    lexer::{Lexer, Op, Token, decode_string},
    runtime::Runtime,
    stmt::{CatchClause, Stmt, StmtKind},
    value::number_to_string,
};

/// Operator precedence; `None` for tokens that never bind as infix
/// operators. Negative levels reduce right-to-left.
fn precedence(op: Op) -> Option<i32> {
    use Op::*;
    Some(match op {
        Dot | OpenBracket | OpenParen | OptDot | OptBracket | OptParen => 20,
        New => 19,
        PostInc | PostDec => 18,
        Not | BitNot | UnaryPlus | UnaryMinus | PreInc | PreDec | Void | TypeOf | Delete => -17,
        Pow => -16,
        Star | Slash | Percent => 15,
        Plus | Minus => 14,
        Shl | Shr | UShr => 13,
        Lt | Le | Gt | Ge | In | InstanceOf => 12,
        Eq | StrictEq | Ne | StrictNe => 11,
        BitAnd => 10,
        BitXor => 9,
        BitOr => 8,
        And => 7,
        Or => 6,
        Nullish => 5,
        Question | Colon => -4,
        Assign | PlusAssign | MinusAssign | StarAssign | SlashAssign | PercentAssign | PowAssign | ShlAssign
        | ShrAssign | UShrAssign | BitAndAssign | BitOrAssign | BitXorAssign | AndAssign | OrAssign
        | NullishAssign => -3,
        Comma => 1,
        _ => return None,
    })
}

/// Should the operator on the stack reduce before `next` is shifted?
fn precedes(top: Op, next: Option<Op>) -> bool {
    let Some(a) = precedence(top) else {
        return false;
    };
    let Some(b) = next.and_then(precedence) else {
        return true;
    };
    let (pa, pb) = (a.abs(), b.abs());
    if pa != pb {
        return pa > pb;
    }
    a >= 0 // equal precedence: reduce unless right-associative
}

pub(crate) fn parse_program(rt: &Runtime, source: &str) -> Result<Stmt, ParseError> {
    let mut parser = Parser::new(rt, source);
    let mut stmts = Vec::new();
    while !matches!(parser.lexer.peek(), Token::Eof) {
        stmts.push(parser.statement()?);
    }
    Ok(Stmt::new(StmtKind::Block(stmts), CodeLoc::new(1, 1)))
}

/// Parses a single expression as a whole program (the embedding entry
/// point for expression-valued configuration).
pub(crate) fn parse_expression_program(rt: &Runtime, source: &str) -> Result<Stmt, ParseError> {
    let mut parser = Parser::new(rt, source);
    let expr = parser.expression(false)?;
    if !matches!(parser.lexer.peek(), Token::Eof) {
        return parser.error("unexpected token");
    }
    let loc = expr.loc;
    let eval = Stmt::new(
        StmtKind::Eval {
            expr,
            export_id: std::cell::Cell::new(None),
        },
        loc,
    );
    Ok(Stmt::new(StmtKind::Block(vec![eval]), CodeLoc::new(1, 1)))
}

struct Parser<'s> {
    rt: &'s Runtime,
    lexer: Lexer<'s>,
    /// Hand-back slot for [`Parser::arrow_function`]: the candidate
    /// parameter list when the lookahead turns out not to be an arrow.
    reclaimed: Option<Expr>,
}

#[derive(Debug)]
struct Pending {
    op: Op,
    loc: CodeLoc,
}

impl<'s> Parser<'s> {
    fn new(rt: &'s Runtime, source: &'s str) -> Self {
        Self {
            rt,
            lexer: Lexer::new(source),
            reclaimed: None,
        }
    }

    fn error<T>(&mut self, message: impl Into<String>) -> Result<T, ParseError> {
        let loc = self.lexer.peek_loc();
        Err(ParseError::at(message.into(), loc))
    }

    fn expect(&mut self, op: Op) -> Result<(), ParseError> {
        if self.lexer.read_op(op) {
            Ok(())
        } else {
            self.error(format!("'{}' expected", op.text()))
        }
    }

    fn intern(&self, text: &str) -> StringId {
        self.rt.intern(text)
    }

    fn identifier_expr(&self, name: &str, loc: CodeLoc) -> Expr {
        Expr::new(ExprKind::Identifier(IdentNode::new(self.intern(name))), loc)
    }

    fn string_expr(&self, text: &str, loc: CodeLoc) -> Expr {
        Expr::new(ExprKind::Str(self.intern(text)), loc)
    }

    fn read_identifier(&mut self) -> Option<String> {
        match self.lexer.peek() {
            Token::Ident(name) => {
                let name = name.clone();
                self.lexer.read();
                Some(name)
            }
            _ => None,
        }
    }

    /// An import/export entry name: an identifier, or a word operator like
    /// `default` (which only occurs aliased).
    fn read_binding_name(&mut self) -> Option<String> {
        match self.lexer.peek() {
            Token::Ident(name) => {
                let name = name.clone();
                self.lexer.read();
                Some(name)
            }
            Token::Op(op) => {
                let name = op.identifier_name()?.to_owned();
                self.lexer.read();
                Some(name)
            }
            _ => None,
        }
    }

    fn read_semicolons(&mut self) {
        while self.lexer.read_op(Op::Semicolon) {}
    }

    /// End of a statement list: end of input, a closing brace, or the next
    /// clause of a `switch`.
    fn peek_block_end(&mut self) -> bool {
        matches!(
            self.lexer.peek(),
            Token::Eof | Token::Op(Op::CloseBrace) | Token::Op(Op::Case) | Token::Op(Op::Default)
        )
    }

    fn statement_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();
        while !self.peek_block_end() {
            stmts.push(self.statement()?);
        }
        Ok(stmts)
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.lexer.peek_loc();
        match self.lexer.peek().clone() {
            Token::Error => self.error("unknown token"),
            Token::Op(Op::Semicolon) => {
                self.read_semicolons();
                Ok(Stmt::new(StmtKind::Block(Vec::new()), loc))
            }
            Token::Op(Op::OpenBrace) => {
                self.lexer.read();
                let stmts = self.statement_block()?;
                self.expect(Op::CloseBrace)?;
                Ok(Stmt::new(StmtKind::Block(stmts), loc))
            }
            Token::Op(Op::Var | Op::Let | Op::Const) => {
                self.lexer.read();
                let decls = self.var_declarators()?;
                self.read_semicolons();
                Ok(Stmt::new(StmtKind::Var { decls }, loc))
            }
            Token::Op(Op::Function) => {
                self.lexer.read();
                let Some(name) = self.read_identifier() else {
                    return self.error("missing identifier");
                };
                let func = self.block_function(loc, Some(&name))?;
                Ok(Stmt::new(
                    StmtKind::Func {
                        name: Box::new(self.identifier_expr(&name, loc)),
                        func,
                        is_definition: std::cell::Cell::new(false),
                    },
                    loc,
                ))
            }
            Token::Op(Op::If) => {
                self.lexer.read();
                self.expect(Op::OpenParen)?;
                let cond = self.expression(false)?;
                self.expect(Op::CloseParen)?;
                let then = Box::new(self.statement()?);
                let otherwise = if self.lexer.read_op(Op::Else) {
                    Some(Box::new(self.statement()?))
                } else {
                    None
                };
                Ok(Stmt::new(StmtKind::If { cond, then, otherwise }, loc))
            }
            Token::Op(Op::Switch) => self.switch_statement(loc),
            Token::Op(Op::While) => {
                self.lexer.read();
                self.expect(Op::OpenParen)?;
                let cond = self.expression(false)?;
                self.expect(Op::CloseParen)?;
                let body = Box::new(self.statement()?);
                Ok(Stmt::new(StmtKind::While { cond, body }, loc))
            }
            Token::Op(Op::Do) => {
                self.lexer.read();
                let body = Box::new(self.statement()?);
                if !self.lexer.read_op(Op::While) {
                    return self.error("'while' expected");
                }
                self.expect(Op::OpenParen)?;
                let cond = self.expression(false)?;
                self.expect(Op::CloseParen)?;
                self.read_semicolons();
                Ok(Stmt::new(StmtKind::DoWhile { body, cond }, loc))
            }
            Token::Op(Op::For) => self.for_statement(loc),
            Token::Op(Op::Break) => {
                self.lexer.read();
                let label = self.asi_label();
                self.read_semicolons();
                Ok(Stmt::new(StmtKind::Break { label }, loc))
            }
            Token::Op(Op::Continue) => {
                self.lexer.read();
                let label = self.asi_label();
                self.read_semicolons();
                Ok(Stmt::new(StmtKind::Continue { label }, loc))
            }
            Token::Op(Op::Return) => {
                self.lexer.read();
                if self.lexer.peek_eol() || self.peek_block_end() || self.lexer.peek().is_op(Op::Semicolon) {
                    self.read_semicolons();
                    return Ok(Stmt::new(StmtKind::Return { expr: None }, loc));
                }
                let expr = self.expression(false)?;
                self.read_semicolons();
                Ok(Stmt::new(StmtKind::Return { expr: Some(expr) }, loc))
            }
            Token::Op(Op::Throw) => {
                self.lexer.read();
                if self.lexer.peek_eol() || self.peek_block_end() {
                    return self.error("missing expression");
                }
                let expr = self.expression(false)?;
                self.read_semicolons();
                Ok(Stmt::new(StmtKind::Throw { expr }, loc))
            }
            Token::Op(Op::Try) => self.try_statement(loc),
            Token::Op(Op::Import) => self.import_statement(loc),
            Token::Op(Op::Export) => self.export_statement(loc),
            Token::Ident(name) => {
                // A label is an identifier directly followed by a colon.
                let mut probe = self.lexer.clone();
                probe.read();
                if probe.peek().is_op(Op::Colon) {
                    self.lexer.read();
                    self.lexer.read();
                    let body = Box::new(self.statement()?);
                    return Ok(Stmt::new(
                        StmtKind::Label {
                            name: self.intern(&name),
                            body,
                        },
                        loc,
                    ));
                }
                self.expression_statement(loc)
            }
            _ => self.expression_statement(loc),
        }
    }

    fn expression_statement(&mut self, loc: CodeLoc) -> Result<Stmt, ParseError> {
        let expr = self.expression(false)?;
        self.lexer.read_op(Op::Semicolon);
        Ok(Stmt::new(
            StmtKind::Eval {
                expr,
                export_id: std::cell::Cell::new(None),
            },
            loc,
        ))
    }

    /// An optional label after `break`/`continue`; a newline inserts the
    /// semicolon first.
    fn asi_label(&mut self) -> Option<StringId> {
        if self.lexer.peek_eol() {
            return None;
        }
        match self.lexer.peek() {
            Token::Ident(name) => {
                let name = name.clone();
                self.lexer.read();
                Some(self.intern(&name))
            }
            _ => None,
        }
    }

    fn var_declarators(&mut self) -> Result<Vec<Expr>, ParseError> {
        if self.lexer.peek_eol() {
            return self.error("missing identifier");
        }
        let mut decls = Vec::new();
        loop {
            decls.push(self.expression(true)?);
            if !self.lexer.read_op(Op::Comma) {
                break;
            }
        }
        Ok(decls)
    }

    fn switch_statement(&mut self, loc: CodeLoc) -> Result<Stmt, ParseError> {
        self.lexer.read();
        self.expect(Op::OpenParen)?;
        let cond = self.expression(false)?;
        self.expect(Op::CloseParen)?;
        self.expect(Op::OpenBrace)?;
        let mut cases = Vec::new();
        let mut has_default = false;
        while !self.lexer.read_op(Op::CloseBrace) {
            if self.lexer.read_op(Op::Default) {
                self.expect(Op::Colon)?;
                if has_default {
                    return self.error("duplicated default clause");
                }
                has_default = true;
                cases.push((None, self.statement_block()?));
            } else if self.lexer.read_op(Op::Case) {
                let test = self.expression(false)?;
                self.expect(Op::Colon)?;
                cases.push((Some(test), self.statement_block()?));
            } else {
                return self.error("case or default clause expected");
            }
        }
        Ok(Stmt::new(StmtKind::Switch { cond, cases }, loc))
    }

    fn for_statement(&mut self, loc: CodeLoc) -> Result<Stmt, ParseError> {
        self.lexer.read();
        self.expect(Op::OpenParen)?;
        let is_var_init = matches!(self.lexer.peek(), Token::Op(Op::Var | Op::Let | Op::Const));
        if is_var_init {
            self.lexer.read();
        }
        let init = if self.lexer.peek().is_op(Op::Semicolon) {
            None
        } else {
            Some(self.expression(false)?)
        };
        self.expect(Op::Semicolon)?;
        let cond = if self.lexer.peek().is_op(Op::Semicolon) {
            None
        } else {
            Some(self.expression(false)?)
        };
        self.expect(Op::Semicolon)?;
        let step = if self.lexer.peek().is_op(Op::CloseParen) {
            None
        } else {
            Some(self.expression(false)?)
        };
        self.expect(Op::CloseParen)?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::new(
            StmtKind::For {
                init,
                is_var_init,
                cond,
                step,
                body,
            },
            loc,
        ))
    }

    fn try_statement(&mut self, loc: CodeLoc) -> Result<Stmt, ParseError> {
        self.lexer.read();
        if !self.lexer.peek().is_op(Op::OpenBrace) {
            return self.error("'{' expected");
        }
        let body = Box::new(self.statement()?);
        let mut catch = None;
        let mut finally = None;
        if self.lexer.read_op(Op::Catch) {
            let param = if self.lexer.read_op(Op::OpenParen) {
                let param = self.expression(false)?;
                self.expect(Op::CloseParen)?;
                Some(param)
            } else {
                None
            };
            if !self.lexer.peek().is_op(Op::OpenBrace) {
                return self.error("'{' expected");
            }
            let body = Box::new(self.statement()?);
            catch = Some(CatchClause {
                param,
                body,
                scope: std::cell::Cell::new(None),
                scopes: std::cell::RefCell::new(None),
            });
        }
        if self.lexer.read_op(Op::Finally) {
            if !self.lexer.peek().is_op(Op::OpenBrace) {
                return self.error("'{' expected");
            }
            finally = Some(Box::new(self.statement()?));
        }
        if catch.is_none() && finally.is_none() {
            return self.error("missing catch or finally");
        }
        Ok(Stmt::new(StmtKind::Try { body, catch, finally }, loc))
    }

    fn import_statement(&mut self, loc: CodeLoc) -> Result<Stmt, ParseError> {
        self.lexer.read();
        let mut list: Vec<(Option<String>, String)> = Vec::new();
        match self.lexer.peek().clone() {
            // Bare side-effect import: `import "path"`.
            Token::Str(raw) => {
                self.lexer.read();
                let path = self.decode(&raw)?;
                self.read_semicolons();
                return Ok(Stmt::new(StmtKind::Import { list, from: path }, loc));
            }
            Token::Op(Op::OpenBrace) => {
                self.lexer.read();
                while !self.lexer.read_op(Op::CloseBrace) {
                    let Some(name) = self.read_binding_name() else {
                        return self.error("missing identifier");
                    };
                    let alias = if self.read_contextual("as") {
                        let Some(alias) = self.read_identifier() else {
                            return self.error("missing identifier");
                        };
                        alias
                    } else {
                        name.clone()
                    };
                    list.push((Some(name), alias));
                    self.lexer.read_op(Op::Comma);
                }
            }
            Token::Op(Op::Star) => {
                self.lexer.read();
                if !self.read_contextual("as") {
                    return self.error("'as' expected");
                }
                let Some(alias) = self.read_identifier() else {
                    return self.error("missing identifier");
                };
                list.push((None, alias));
            }
            _ => return self.error("unexpected token"),
        }
        let from = self.read_from_path()?;
        self.read_semicolons();
        Ok(Stmt::new(StmtKind::Import { list, from }, loc))
    }

    fn export_statement(&mut self, loc: CodeLoc) -> Result<Stmt, ParseError> {
        self.lexer.read();
        if self.lexer.read_op(Op::Default) {
            let decl = if self.lexer.peek().is_op(Op::Function) {
                let func_loc = self.lexer.peek_loc();
                self.lexer.read();
                let Some(name) = self.read_identifier() else {
                    return self.error("missing identifier");
                };
                let func = self.block_function(func_loc, Some(&name))?;
                Stmt::new(
                    StmtKind::Func {
                        name: Box::new(self.identifier_expr(&name, func_loc)),
                        func,
                        is_definition: std::cell::Cell::new(false),
                    },
                    func_loc,
                )
            } else {
                let stmt_loc = self.lexer.peek_loc();
                let expr = self.expression(false)?;
                self.read_semicolons();
                Stmt::new(
                    StmtKind::Eval {
                        expr,
                        export_id: std::cell::Cell::new(None),
                    },
                    stmt_loc,
                )
            };
            return Ok(Stmt::new(
                StmtKind::Export {
                    decl: Some(Box::new(decl)),
                    is_default: true,
                    list: Vec::new(),
                    from: None,
                },
                loc,
            ));
        }

        match self.lexer.peek().clone() {
            Token::Op(Op::OpenBrace) => {
                self.lexer.read();
                let mut list: Vec<(String, Option<String>)> = Vec::new();
                while !self.lexer.read_op(Op::CloseBrace) {
                    let Some(name) = self.read_binding_name() else {
                        return self.error("missing identifier");
                    };
                    let alias = if self.read_contextual("as") {
                        match self.read_identifier() {
                            Some(alias) => Some(alias),
                            None => return self.error("missing identifier"),
                        }
                    } else {
                        None
                    };
                    list.push((name, alias));
                    self.lexer.read_op(Op::Comma);
                }
                let from = if self.peek_contextual("from") {
                    Some(self.read_from_path()?)
                } else {
                    None
                };
                self.read_semicolons();
                Ok(Stmt::new(
                    StmtKind::Export {
                        decl: None,
                        is_default: false,
                        list,
                        from,
                    },
                    loc,
                ))
            }
            Token::Op(Op::Var | Op::Let | Op::Const | Op::Function) => {
                let decl = self.statement()?;
                Ok(Stmt::new(
                    StmtKind::Export {
                        decl: Some(Box::new(decl)),
                        is_default: false,
                        list: Vec::new(),
                        from: None,
                    },
                    loc,
                ))
            }
            _ => self.error("unexpected token"),
        }
    }

    fn peek_contextual(&mut self, word: &str) -> bool {
        matches!(self.lexer.peek(), Token::Ident(name) if name == word)
    }

    fn read_contextual(&mut self, word: &str) -> bool {
        if self.peek_contextual(word) {
            self.lexer.read();
            true
        } else {
            false
        }
    }

    fn read_from_path(&mut self) -> Result<String, ParseError> {
        if !self.read_contextual("from") {
            return self.error("'from' expected");
        }
        match self.lexer.peek().clone() {
            Token::Str(raw) => {
                self.lexer.read();
                self.decode(&raw)
            }
            _ => self.error("unexpected token"),
        }
    }

    fn decode(&mut self, raw: &str) -> Result<String, ParseError> {
        match decode_string(raw) {
            Ok(s) => Ok(s),
            Err(message) => self.error(message),
        }
    }

    // ----------------------------------------------------------------
    // Expressions
    // ----------------------------------------------------------------

    fn expression(&mut self, no_comma: bool) -> Result<Expr, ParseError> {
        let mut operators: Vec<Pending> = Vec::new();
        let mut operands: Vec<Option<Expr>> = Vec::new();

        loop {
            let last_op = operators.last().map(|p| p.op);

            if matches!(last_op, Some(Op::OpenParen | Op::OptParen | Op::OpenBracket | Op::OptBracket)) {
                self.close_paren_like(&mut operators, &mut operands)?;
            } else if matches!(last_op, Some(Op::Dot | Op::OptDot)) {
                // Member name position: identifiers and word operators.
                let loc = self.lexer.peek_loc();
                match self.lexer.peek().clone() {
                    Token::Ident(name) => {
                        self.lexer.read();
                        operands.push(Some(self.identifier_expr(&name, loc)));
                    }
                    Token::Op(op) if op.identifier_name().is_some() => {
                        self.lexer.read();
                        let name = op.identifier_name().expect("checked above");
                        operands.push(Some(self.identifier_expr(name, loc)));
                    }
                    _ => return self.error("unexpected token"),
                }
            } else {
                // Prefix operators, then an operand.
                loop {
                    let loc = self.lexer.peek_loc();
                    let rewritten = match self.lexer.peek() {
                        Token::Eof => return self.error("unexpected end of script"),
                        Token::Error => return self.error("unknown token"),
                        Token::Op(Op::Plus) => Some(Op::UnaryPlus),
                        Token::Op(Op::Minus) => Some(Op::UnaryMinus),
                        Token::Op(Op::Inc) => Some(Op::PreInc),
                        Token::Op(Op::Dec) => Some(Op::PreDec),
                        Token::Op(
                            op @ (Op::BitNot | Op::Not | Op::Void | Op::TypeOf | Op::New | Op::Delete),
                        ) => Some(*op),
                        _ => None,
                    };
                    match rewritten {
                        Some(op) => {
                            self.lexer.read();
                            operands.push(None);
                            operators.push(Pending { op, loc });
                        }
                        None => break,
                    }
                }

                let trailing_comma = self.lexer.peek().is_op(Op::CloseParen)
                    && matches!(operators.last(), Some(p) if p.op == Op::Comma);
                if trailing_comma {
                    operands.push(None);
                } else {
                    let operand = self.operand()?;
                    operands.push(Some(operand));
                }
            }

            // Shift/reduce over infix and postfix operators.
            loop {
                let eol = self.lexer.peek_eol();
                let token = self.lexer.peek().clone();
                if matches!(token, Token::Error) {
                    return self.error("unknown token");
                }
                let mut is_end = match &token {
                    Token::Eof => true,
                    Token::Op(Op::Semicolon | Op::CloseParen | Op::CloseBracket | Op::CloseBrace) => true,
                    Token::Op(Op::Comma) if no_comma => true,
                    Token::Op(Op::Colon) => !operators.iter().any(|p| p.op == Op::Question),
                    Token::Op(Op::Case | Op::Default) => true,
                    _ => false,
                };
                let mut next = match &token {
                    Token::Op(op) => Some(*op),
                    _ => None,
                };
                if !is_end && next.is_none() {
                    if eol {
                        is_end = true;
                    } else {
                        return self.error("unexpected token");
                    }
                }
                match next {
                    Some(Op::BitNot | Op::Not | Op::Void | Op::TypeOf | Op::New | Op::Delete) if !is_end => {
                        return self.error("unexpected token");
                    }
                    Some(Op::Inc) => {
                        if eol {
                            is_end = true;
                            next = None;
                        } else {
                            next = Some(Op::PostInc);
                        }
                    }
                    Some(Op::Dec) => {
                        if eol {
                            is_end = true;
                            next = None;
                        } else {
                            next = Some(Op::PostDec);
                        }
                    }
                    _ => {}
                }
                if is_end {
                    next = None;
                }

                while let Some(top) = operators.last()
                    && (is_end || precedes(top.op, next))
                {
                    self.reduce(&mut operators, &mut operands, next)?;
                }

                if !is_end {
                    let next = next.expect("non-end token is an operator");
                    let (_, loc) = self.lexer.read();
                    operators.push(Pending { op: next, loc });
                    if matches!(next, Op::PostInc | Op::PostDec) {
                        operands.push(None);
                        continue;
                    }
                }
                break;
            }

            if operators.is_empty() {
                break;
            }
        }

        match operands.pop() {
            Some(Some(e)) => Ok(e),
            _ => self.error("incomplete expression"),
        }
    }

    /// Reduces the top operator against the two top operands.
    fn reduce(
        &mut self,
        operators: &mut Vec<Pending>,
        operands: &mut Vec<Option<Expr>>,
        next: Option<Op>,
    ) -> Result<(), ParseError> {
        let b = operands.pop().flatten();
        let a = operands.pop().flatten();
        let Pending { op, loc } = operators.pop().expect("reduce with operator on stack");

        if next == Some(Op::Pow)
            && matches!(op, Op::BitNot | Op::Not | Op::UnaryPlus | Op::UnaryMinus)
        {
            return Err(ParseError::at("ambiguous exponentiation precedence", loc));
        }

        let unary = |x: Option<Expr>, f: fn(Box<Expr>) -> ExprKind| -> Result<Expr, ParseError> {
            match x {
                Some(x) => Ok(Expr::new(f(Box::new(x)), loc)),
                None => Err(ParseError::at("incomplete expression", loc)),
            }
        };
        let binary = |a: Option<Expr>, b: Option<Expr>, op: Op| -> Result<Expr, ParseError> {
            match (a, b) {
                (Some(a), Some(b)) => Ok(make_binary(op, a, b, loc)),
                _ => Err(ParseError::at("incomplete expression", loc)),
            }
        };

        let expr = match op {
            Op::InstanceOf | Op::In => binary(a, b, op)?,
            Op::TypeOf => unary(b, ExprKind::TypeOf)?,
            Op::New => match b {
                Some(func) => Expr::new(
                    ExprKind::New {
                        func: Box::new(func),
                        args: Vec::new(),
                    },
                    loc,
                ),
                None => return Err(ParseError::at("incomplete expression", loc)),
            },
            Op::Delete => unary(b, ExprKind::Delete)?,
            Op::Void => unary(b, ExprKind::Discard)?,
            Op::UnaryPlus => unary(b, |x| ExprKind::Unary {
                op: crate::expr::UnaryOp::Pos,
                x,
            })?,
            Op::UnaryMinus => unary(b, |x| ExprKind::Unary {
                op: crate::expr::UnaryOp::Neg,
                x,
            })?,
            Op::BitNot => unary(b, |x| ExprKind::Unary {
                op: crate::expr::UnaryOp::BitNot,
                x,
            })?,
            Op::Not => unary(b, |x| ExprKind::Unary {
                op: crate::expr::UnaryOp::Not,
                x,
            })?,
            Op::PreInc => unary(b, |x| ExprKind::IncDec {
                inc: true,
                prefix: true,
                x,
            })?,
            Op::PreDec => unary(b, |x| ExprKind::IncDec {
                inc: false,
                prefix: true,
                x,
            })?,
            Op::PostInc => unary(a, |x| ExprKind::IncDec {
                inc: true,
                prefix: false,
                x,
            })?,
            Op::PostDec => unary(a, |x| ExprKind::IncDec {
                inc: false,
                prefix: false,
                x,
            })?,
            Op::Plus | Op::Minus | Op::Star | Op::Slash | Op::Percent | Op::Pow | Op::Shl | Op::Shr | Op::UShr
            | Op::BitAnd | Op::BitOr | Op::BitXor | Op::And | Op::Or | Op::Nullish | Op::Eq | Op::Ne
            | Op::StrictEq | Op::StrictNe | Op::Gt | Op::Ge | Op::Lt | Op::Le | Op::Assign | Op::PlusAssign
            | Op::MinusAssign | Op::StarAssign | Op::SlashAssign | Op::PercentAssign | Op::PowAssign
            | Op::ShlAssign | Op::ShrAssign | Op::UShrAssign | Op::BitAndAssign | Op::BitOrAssign
            | Op::BitXorAssign | Op::AndAssign | Op::OrAssign | Op::NullishAssign => binary(a, b, op)?,
            Op::Comma => {
                let Some(a) = a else {
                    return Err(ParseError::at("incomplete expression", loc));
                };
                let comma_ended = b.is_none();
                match a.kind {
                    ExprKind::Compound { mut exprs, .. } => {
                        if let Some(b) = b {
                            exprs.push(b);
                        }
                        Expr::new(ExprKind::Compound { exprs, comma_ended }, a.loc)
                    }
                    _ => {
                        let mut exprs = vec![a];
                        if let Some(b) = b {
                            exprs.push(b);
                        }
                        Expr::new(ExprKind::Compound { exprs, comma_ended }, loc)
                    }
                }
            }
            Op::Dot | Op::OptDot => {
                let (Some(a), Some(b)) = (a, b) else {
                    return Err(ParseError::at("incomplete expression", loc));
                };
                let ExprKind::Identifier(ident) = b.kind else {
                    return self.error("unexpected token");
                };
                Expr::new(
                    ExprKind::Property {
                        obj: Box::new(a),
                        key: Box::new(Expr::new(ExprKind::Str(ident.key), b.loc)),
                        optional: op == Op::OptDot,
                        cache: crate::class::PropertyCache::new(),
                    },
                    loc,
                )
            }
            Op::Colon => {
                let matches_question = matches!(operators.last(), Some(p) if p.op == Op::Question);
                if !matches_question {
                    return self.error("unexpected token");
                }
                let Pending { loc: qloc, .. } = operators.pop().expect("question on stack");
                let cond = operands.pop().flatten();
                let (Some(cond), Some(a), Some(b)) = (cond, a, b) else {
                    return Err(ParseError::at("incomplete expression", qloc));
                };
                Expr::new(
                    ExprKind::Conditional {
                        cond: Box::new(cond),
                        then: Box::new(a),
                        otherwise: Box::new(b),
                    },
                    qloc,
                )
            }
            Op::Question => return self.error("unexpected token"),
            _ => return self.error("unknown operator"),
        };
        operands.push(Some(expr));
        Ok(())
    }

    /// The top operator is `(`, `?.(`, `[` or `?.[`: read the argument (or
    /// subscript) list, then fold into a call, construction or property
    /// access.
    fn close_paren_like(&mut self, operators: &mut Vec<Pending>, operands: &mut Vec<Option<Expr>>) -> Result<(), ParseError> {
        let Pending { op, loc } = operators.pop().expect("paren-like operator on stack");
        let is_call = matches!(op, Op::OpenParen | Op::OptParen);
        let closing = if is_call { Op::CloseParen } else { Op::CloseBracket };

        let mut args = Vec::new();
        loop {
            match self.lexer.peek() {
                Token::Eof => return self.error("unexpected end of script"),
                Token::Error => return self.error("unknown token"),
                t if t.is_op(closing) => break,
                _ => {}
            }
            args.push(self.expression(is_call)?);
            if !is_call {
                break;
            }
            self.lexer.read_op(Op::Comma);
        }
        if !self.lexer.read_op(closing) {
            return self.error("unexpected token");
        }

        let callee = operands.pop().flatten();
        let Some(callee) = callee else {
            return Err(ParseError::at("incomplete expression", loc));
        };
        let is_new = matches!(operators.last(), Some(p) if p.op == Op::New);
        if is_call && is_new {
            if op == Op::OptParen {
                return self.error("optional chaining cannot be used with 'new'");
            }
            let Pending { loc: new_loc, .. } = operators.pop().expect("new on stack");
            operands.pop();
            operands.push(Some(Expr::new(
                ExprKind::New {
                    func: Box::new(callee),
                    args,
                },
                new_loc,
            )));
        } else if is_call {
            operands.push(Some(Expr::new(
                ExprKind::Call {
                    func: Box::new(callee),
                    args,
                    optional: op == Op::OptParen,
                },
                loc,
            )));
        } else if args.len() != 1 {
            return self.error("unexpected token");
        } else {
            let key = args.pop().expect("exactly one subscript");
            operands.push(Some(Expr::new(
                ExprKind::Property {
                    obj: Box::new(callee),
                    key: Box::new(key),
                    optional: op == Op::OptBracket,
                    cache: crate::class::PropertyCache::new(),
                },
                loc,
            )));
        }
        Ok(())
    }

    // ----------------------------------------------------------------
    // Operands
    // ----------------------------------------------------------------

    fn operand(&mut self) -> Result<Expr, ParseError> {
        let loc = self.lexer.peek_loc();
        match self.lexer.peek().clone() {
            Token::Op(Op::OpenParen) => {
                self.lexer.read();
                if self.lexer.read_op(Op::CloseParen) {
                    // `()` can only start an arrow function.
                    if let Some(f) = self.arrow_function(loc, None)? {
                        return Ok(f);
                    }
                    return self.error("'=>' expected");
                }
                let e = self.expression(false)?;
                let close_loc = self.lexer.peek_loc();
                self.expect(Op::CloseParen)?;
                if let Some(f) = self.arrow_function(loc, Some(e))? {
                    return Ok(f);
                }
                // arrow_function() hands the expression back on decline.
                let e = self.reclaimed.take().expect("operand reclaimed");
                if matches!(&e.kind, ExprKind::Compound { comma_ended: true, .. }) {
                    return Err(ParseError::at("incomplete expression", close_loc));
                }
                Ok(e)
            }
            Token::Op(Op::Backtick) => self.template_literal(loc),
            Token::Op(Op::Function) => {
                self.lexer.read();
                let name = self.read_identifier();
                self.block_function(loc, name.as_deref())
            }
            Token::Op(Op::Undefined) => {
                self.lexer.read();
                Ok(Expr::new(ExprKind::Undefined, loc))
            }
            Token::Op(Op::Null) => {
                self.lexer.read();
                Ok(Expr::new(ExprKind::Null, loc))
            }
            Token::Op(Op::True) => {
                self.lexer.read();
                Ok(Expr::new(ExprKind::Boolean(true), loc))
            }
            Token::Op(Op::False) => {
                self.lexer.read();
                Ok(Expr::new(ExprKind::Boolean(false), loc))
            }
            Token::Number(n) => {
                self.lexer.read();
                Ok(Expr::new(ExprKind::Number(n), loc))
            }
            Token::Str(raw) => {
                self.lexer.read();
                let text = self.decode(&raw)?;
                Ok(self.string_expr(&text, loc))
            }
            Token::Ident(name) => {
                self.lexer.read();
                let e = self.identifier_expr(&name, loc);
                if let Some(f) = self.arrow_function(loc, Some(e))? {
                    return Ok(f);
                }
                Ok(self.reclaimed.take().expect("operand reclaimed"))
            }
            Token::Op(Op::OpenBrace) => self.object_literal(loc),
            Token::Op(Op::OpenBracket) => self.array_literal(loc),
            _ => self.error("unexpected token"),
        }
    }

    fn template_literal(&mut self, loc: CodeLoc) -> Result<Expr, ParseError> {
        self.lexer.read();
        self.lexer.set_template_mode(true);
        let mut parts = Vec::new();
        loop {
            let part_loc = self.lexer.peek_loc();
            match self.lexer.peek().clone() {
                Token::Eof => {
                    self.lexer.set_template_mode(false);
                    return self.error("unexpected end of script");
                }
                Token::Error => {
                    self.lexer.set_template_mode(false);
                    return self.error("unknown token");
                }
                Token::Op(Op::Backtick) => {
                    self.lexer.read();
                    break;
                }
                Token::Op(Op::DollarBrace) => {
                    self.lexer.read();
                    self.lexer.set_template_mode(false);
                    let e = self.expression(false)?;
                    if !self.lexer.peek().is_op(Op::CloseBrace) {
                        return self.error("unexpected token");
                    }
                    self.lexer.read();
                    self.lexer.set_template_mode(true);
                    parts.push(e);
                }
                Token::Template(chunk) => {
                    self.lexer.read();
                    let text = self.decode(&format!("`{chunk}`"))?;
                    parts.push(self.string_expr(&text, part_loc));
                }
                _ => {
                    self.lexer.set_template_mode(false);
                    return self.error("unexpected token");
                }
            }
        }
        self.lexer.set_template_mode(false);
        Ok(Expr::new(ExprKind::Concat(parts), loc))
    }

    fn object_literal(&mut self, loc: CodeLoc) -> Result<Expr, ParseError> {
        self.lexer.read();
        let mut entries = Vec::new();
        loop {
            let entry_loc = self.lexer.peek_loc();
            if self.lexer.read_op(Op::CloseBrace) {
                break;
            }
            let mut shorthand: Option<String> = None;
            let mut key: Option<Expr> = None;
            let mut value: Option<Expr> = None;
            match self.lexer.peek().clone() {
                Token::Str(raw) => {
                    self.lexer.read();
                    let text = self.decode(&raw)?;
                    key = Some(self.string_expr(&text, entry_loc));
                }
                Token::Number(n) => {
                    self.lexer.read();
                    let text = self.rt.str(number_to_string(n, self.rt)).to_string();
                    key = Some(self.string_expr(&text, entry_loc));
                }
                Token::Op(Op::OpenBracket) => {
                    self.lexer.read();
                    key = Some(self.expression(false)?);
                    self.expect(Op::CloseBracket)?;
                }
                Token::Op(Op::Ellipsis) => {
                    self.lexer.read();
                    value = Some(self.expression(true)?);
                }
                Token::Ident(name) => {
                    self.lexer.read();
                    key = Some(self.string_expr(&name, entry_loc));
                    shorthand = Some(name);
                }
                Token::Op(op) if op.identifier_name().is_some() => {
                    self.lexer.read();
                    let name = op.identifier_name().expect("checked above");
                    key = Some(self.string_expr(name, entry_loc));
                    shorthand = Some(name.to_owned());
                }
                _ => return self.error("unexpected token"),
            }
            if value.is_none() {
                if let Some(name) = &shorthand
                    && matches!(self.lexer.peek(), Token::Op(Op::Comma | Op::CloseBrace | Op::Assign))
                {
                    // Shorthand `{ a }`; `{ a = 1 }` only makes sense in a
                    // destructuring pattern and parses as a default.
                    let ident = self.identifier_expr(name, entry_loc);
                    if self.lexer.read_op(Op::Assign) {
                        let default = self.expression(true)?;
                        value = Some(Expr::new(
                            ExprKind::Assign {
                                target: Box::new(ident),
                                value: Box::new(default),
                            },
                            entry_loc,
                        ));
                    } else {
                        value = Some(ident);
                    }
                } else if self.lexer.read_op(Op::Colon) {
                    value = Some(self.expression(true)?);
                } else {
                    return self.error("unexpected token");
                }
            }
            entries.push(ObjEntry {
                key,
                value: value.expect("entry value set"),
            });
            self.lexer.read_op(Op::Comma);
        }
        Ok(Expr::new(
            ExprKind::Object {
                entries,
                shape: std::cell::RefCell::new(None),
            },
            loc,
        ))
    }

    fn array_literal(&mut self, loc: CodeLoc) -> Result<Expr, ParseError> {
        self.lexer.read();
        let mut items = Vec::new();
        loop {
            if self.lexer.read_op(Op::CloseBracket) {
                break;
            }
            if self.lexer.read_op(Op::Ellipsis) {
                let item_loc = self.lexer.peek_loc();
                let e = self.expression(true)?;
                items.push(Expr::new(ExprKind::Expand(Box::new(e)), item_loc));
            } else {
                items.push(self.expression(true)?);
            }
            self.lexer.read_op(Op::Comma);
        }
        Ok(Expr::new(ExprKind::Array(items), loc))
    }

    // ----------------------------------------------------------------
    // Functions
    // ----------------------------------------------------------------

    /// `function [name] (params) { body }` after the keyword and optional
    /// name have been read.
    fn block_function(&mut self, loc: CodeLoc, name: Option<&str>) -> Result<Expr, ParseError> {
        self.expect(Op::OpenParen)?;
        let params = if self.lexer.read_op(Op::CloseParen) {
            Vec::new()
        } else {
            let args = self.expression(false)?;
            self.expect(Op::CloseParen)?;
            if !args.is_argument() && !args.is_argument_list() {
                return self.error("invalid argument list");
            }
            break_down_params(args)
        };
        self.expect(Op::OpenBrace)?;
        let body_loc = self.lexer.peek_loc();
        let body = self.statement_block()?;
        self.expect(Op::CloseBrace)?;
        let node = FunctionNode::new(
            name.unwrap_or("").to_owned(),
            params,
            Stmt::new(StmtKind::Block(body), body_loc),
            loc,
        );
        Ok(Expr::new(ExprKind::Function(node), loc))
    }

    /// Tries to parse `=> body` after a potential parameter list. Returns
    /// `Ok(None)` (with the expression parked in `self.reclaimed`) when the
    /// next token is not an arrow.
    fn arrow_function(&mut self, loc: CodeLoc, params: Option<Expr>) -> Result<Option<Expr>, ParseError> {
        let eol = self.lexer.peek_eol();
        if !self.lexer.peek().is_op(Op::Arrow) {
            self.reclaimed = params;
            return Ok(None);
        }
        if eol {
            return self.error("unexpected end of line");
        }
        self.lexer.read();
        if let Some(params) = &params
            && !params.is_argument()
            && !params.is_argument_list()
        {
            return self.error("invalid argument list");
        }
        let params = params.map_or_else(Vec::new, break_down_params);
        let body = if self.lexer.read_op(Op::OpenBrace) {
            let body_loc = self.lexer.peek_loc();
            let body = self.statement_block()?;
            self.expect(Op::CloseBrace)?;
            Stmt::new(StmtKind::Block(body), body_loc)
        } else {
            let body_loc = self.lexer.peek_loc();
            let e = self.expression(true)?;
            Stmt::new(StmtKind::Return { expr: Some(e) }, body_loc)
        };
        let node = FunctionNode::new(String::new(), params, body, loc);
        Ok(Some(Expr::new(ExprKind::Function(node), loc)))
    }
}

/// Splits a parsed parameter-list expression into individual parameters.
fn break_down_params(args: Expr) -> Vec<Expr> {
    match args.kind {
        ExprKind::Compound { exprs, .. } => exprs,
        _ => vec![args],
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::runtime::Runtime;

    fn dump(src: &str) -> String {
        let rt = Runtime::new();
        let tree = parse_program(&rt, src).unwrap();
        let mut out = String::new();
        tree.dump(&rt, &mut out, 0);
        out
    }

    fn parse_err(src: &str) -> ParseError {
        let rt = Runtime::new();
        parse_program(&rt, src).unwrap_err()
    }

    #[test]
    fn precedence_shapes_the_tree() {
        let out = dump("1 + 2 * 3");
        let mul = out.find("mul").unwrap();
        let add = out.find("add").unwrap();
        assert!(add < mul, "addition reduces above multiplication:\n{out}");
    }

    #[test]
    fn exponentiation_is_right_associative() {
        let out = dump("2 ** 3 ** 2");
        // The top pow's right operand is itself a pow.
        assert_eq!(out.matches("pow").count(), 2);
        let first = out.find("pow").unwrap();
        let second = out.rfind("pow").unwrap();
        assert!(first < second);
        assert!(out[first..second].contains("number 2"));
    }

    #[test]
    fn unary_before_exponentiation_is_rejected() {
        assert_eq!(parse_err("a ** -b").message, "ambiguous exponentiation precedence");
        assert_eq!(parse_err("-a ** b").message, "ambiguous exponentiation precedence");
    }

    #[test]
    fn optional_chain_with_new_is_rejected() {
        let err = parse_err("new f?.()");
        assert_eq!(err.message, "optional chaining cannot be used with 'new'");
    }

    #[test]
    fn ternary_with_compound_middle() {
        let out = dump("a ? b + c : d");
        assert!(out.contains("conditional"));
        assert!(out.contains("add"));
    }

    #[test]
    fn member_names_may_be_reserved_words() {
        let out = dump("a.default");
        assert!(out.contains("string \"default\""));
    }

    #[test]
    fn arrow_function_forms() {
        assert!(dump("x => x + 1").contains("function"));
        assert!(dump("(a, b) => a + b").contains("function"));
        assert!(dump("() => 1").contains("function"));
        assert!(dump("(a = 1) => a").contains("assignment"));
    }

    #[test]
    fn template_literals_decompose() {
        let out = dump("`a${x}b`");
        assert!(out.contains("concatenation"));
        assert!(out.contains("string \"a\""));
        assert!(out.contains("identifier x"));
        assert!(out.contains("string \"b\""));
    }

    #[test]
    fn switch_statement_with_default() {
        let out = dump("switch (x) { case 1: break; default: y; }");
        assert!(out.contains("switch"));
        assert!(out.contains("case"));
        assert!(out.contains("default"));
    }

    #[test]
    fn duplicate_default_is_rejected() {
        let err = parse_err("switch (x) { default: ; default: ; }");
        assert_eq!(err.message, "duplicated default clause");
    }

    #[test]
    fn statements_parse() {
        assert!(dump("do { x; } while (y)").contains("do-while"));
        assert!(dump("outer: for (;;) { break outer; }").contains("label outer"));
        assert!(dump("import {a, b as c} from 'm';").contains("import from 'm'"));
        assert!(dump("export default 42;").contains("export default"));
        assert!(dump("export {x} from 'm';").contains("export from 'm'"));
    }

    #[test]
    fn return_semicolon_insertion() {
        let out = dump("function f() { return\n1 }");
        // The newline terminates the return; 1 is a separate statement.
        let ret = out.find("return").unwrap();
        let num = out.find("number 1").unwrap();
        assert!(ret < num);
        assert!(!out[ret..num].contains("eval"), "value attached to return:\n{out}");
    }

    #[test]
    fn parse_error_carries_position() {
        let err = parse_err("var x = \n  @");
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 3);
    }

    #[test]
    fn reparsing_yields_an_identical_tree() {
        let src = "function f(a, b = 2) { return a + b; }\nlet {x = 1} = f(1);\n[1, 2, 3].map(n => n * x);";
        assert_eq!(dump(src), dump(src));
    }
}
