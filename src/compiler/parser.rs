/*!

This module parses source code into `Item`s.

The language is given by the following EBNF:
    ```text
    <program>      ::=  <item>*
    <item>         ::=  <function> | <declaration>
    <function>     ::=  '(' 'FUNC' <name> '(' <name>* ')' <expression>* ')'
    <declaration>  ::=  '(' ('INIT' | 'VAR') <name> <expression> ')'
    <expression>   ::=  <integer> | '@' <name> | '*'? <name>
                     |  <declaration>
                     |  '(' 'SET' '*'? <name> <expression> ')'
                     |  '(' 'IF' <expression> <block> <block> ')'
                     |  '(' 'WHILE' <expression> <expression>* ')'
                     |  '(' <operator> <expression>+ ')'
                     |  '(' <name> <expression>* ')'
    <block>        ::=  '(' <expression>* ')'
    ```

Each production returns `Ok(None)` when the tokens in front of it do not start that
production, leaving the position where it was. Once a production has seen enough to know
the form it is parsing, which for every parenthesized form is its head, a mismatch is an
error rather than a backtrack. A top-level declaration must be initialized with a literal,
but that is checked by the code generator, not here.

*/

use std::str::FromStr;

use super::ast::*;
use super::lexer::{tokenize, Token};
use super::Name;
use crate::bytecode::{BinaryOperator, UnaryOperator};
use crate::error::CompileError;

type Parsed<T> = Result<Option<T>, CompileError>;

/// Parses source text to produce its top-level items.
pub fn parse(source: &str) -> Result<Vec<Item>, CompileError> {
  let tokens = tokenize(source)?;
  Parser::new(&tokens).parse_program()
}

/// Parses a single expression, which must be all of `source`.
pub fn parse_expression(source: &str) -> Result<Expression, CompileError> {
  let tokens = tokenize(source)?;
  let mut parser = Parser::new(&tokens);
  match parser.parse_expression()? {
    Some(expression) if parser.at_end() => Ok(expression),
    _                                    => Err(parser.unexpected("an expression"))
  }
}

struct Parser<'t> {
  tokens  : &'t [Token],
  position: usize,
}

impl<'t> Parser<'t> {
  fn new(tokens: &'t [Token]) -> Self {
    Parser {
      tokens,
      position: 0
    }
  }

  // region Token utilities

  fn at_end(&self) -> bool {
    self.position >= self.tokens.len()
  }

  fn peek(&self) -> Option<&'t Token> {
    self.tokens.get(self.position)
  }

  /// The atom immediately after a left parenthesis at the current position.
  fn form_head(&self) -> Option<&'t str> {
    match (self.tokens.get(self.position), self.tokens.get(self.position + 1)) {
      (Some(Token::LeftParen), Some(Token::Atom(head))) => Some(&**head),
      _                                                 => None
    }
  }

  fn found(&self) -> String {
    match self.peek() {
      Some(token) => format!("`{}`", token),
      None        => "end of input".to_string()
    }
  }

  fn unexpected(&self, expected: &str) -> CompileError {
    CompileError::Syntax {
      position: self.position,
      message : format!("expected {}, found {}", expected, self.found())
    }
  }

  fn malformed(&self, form: &'static str, expected: &str) -> CompileError {
    CompileError::MalformedForm {
      form,
      position: self.position,
      message : format!("expected {}, found {}", expected, self.found())
    }
  }

  fn expect(&mut self, token: Token, form: &'static str) -> Result<(), CompileError> {
    match self.peek() == Some(&token) {
      true  => {
        self.position += 1;
        Ok(())
      }
      false => Err(self.malformed(form, &format!("`{}`", token)))
    }
  }

  /// Consumes a plain name, or fails with a malformed `form`.
  fn expect_name(&mut self, form: &'static str) -> Result<Name, CompileError> {
    match self.peek() {
      Some(Token::Atom(atom)) if is_name(atom) => {
        self.position += 1;
        Ok(atom.clone())
      }
      _ => Err(self.malformed(form, "a name"))
    }
  }

  /// Consumes a name with an optional `*`, returning the name and whether it had one.
  fn expect_target(&mut self, form: &'static str) -> Result<(Name, bool), CompileError> {
    if let Some(Token::Atom(atom)) = self.peek() {
      if let Some(name) = atom.strip_prefix('*').filter(|name| is_name(name)) {
        self.position += 1;
        return Ok((Name::from(name), true));
      }
    }
    self.expect_name(form).map(|name| (name, false))
  }

  fn expect_expression(&mut self, form: &'static str) -> Result<Expression, CompileError> {
    match self.parse_expression()? {
      Some(expression) => Ok(expression),
      None             => Err(self.malformed(form, "an expression"))
    }
  }

  // endregion

  // region Productions

  /// <program> ::= <item>*
  fn parse_program(&mut self) -> Result<Vec<Item>, CompileError> {
    let mut items = Vec::new();

    while !self.at_end() {
      match self.parse_item()? {
        Some(item) => items.push(item),
        None       => return Err(self.unexpected("a function or a declaration"))
      }
    }

    Ok(items)
  }

  /// <item> ::= <function> | <declaration>
  fn parse_item(&mut self) -> Parsed<Item> {
    match self.form_head() {

      Some(FUNCTION_KEYWORD) => {
        let function = self.parse_function()?;
        Ok(Some(Item::Function(function)))
      }

      Some(DECLARATION_KEYWORD) | Some(VARIABLE_KEYWORD) => {
        let (name, value) = self.parse_declaration()?;
        Ok(Some(Item::Declaration { name, value }))
      }

      _ => Ok(None)

    }
  }

  /// <function> ::= '(' 'FUNC' <name> '(' <name>* ')' <expression>* ')'
  fn parse_function(&mut self) -> Result<Function, CompileError> {
    self.position += 2;
    let name = self.expect_name(FUNCTION_KEYWORD)?;

    self.expect(Token::LeftParen, FUNCTION_KEYWORD)?;
    let mut parameters = Vec::new();
    while let Some(Token::Atom(atom)) = self.peek() {
      if !is_name(atom) {
        break;
      }
      parameters.push(atom.clone());
      self.position += 1;
    }
    self.expect(Token::RightParen, FUNCTION_KEYWORD)?;

    let body = self.parse_sequence()?;
    self.expect(Token::RightParen, FUNCTION_KEYWORD)?;

    Ok(Function { name, parameters, body })
  }

  /// <declaration> ::= '(' ('INIT' | 'VAR') <name> <expression> ')'
  fn parse_declaration(&mut self) -> Result<(Name, Expression), CompileError> {
    self.position += 2;
    let name  = self.expect_name(DECLARATION_KEYWORD)?;
    let value = self.expect_expression(DECLARATION_KEYWORD)?;
    self.expect(Token::RightParen, DECLARATION_KEYWORD)?;
    Ok((name, value))
  }

  /// <expression>*
  fn parse_sequence(&mut self) -> Result<Vec<Expression>, CompileError> {
    let mut expressions = Vec::new();
    while let Some(expression) = self.parse_expression()? {
      expressions.push(expression);
    }
    Ok(expressions)
  }

  /// <block> ::= '(' <expression>* ')'
  fn parse_block(&mut self, form: &'static str) -> Result<Vec<Expression>, CompileError> {
    self.expect(Token::LeftParen, form)?;
    let block = self.parse_sequence()?;
    self.expect(Token::RightParen, form)?;
    Ok(block)
  }

  fn parse_expression(&mut self) -> Parsed<Expression> {
    let expression =
      match self.peek() {

        None | Some(Token::RightParen) => None,

        Some(Token::LeftParen) => return self.parse_form(),

        Some(Token::Integer(value)) => Some(Expression::Literal(*value)),

        Some(Token::Atom(atom)) => {
          if let Some(name) = atom.strip_prefix('@') {
            is_name(name).then(|| Expression::Symbol(Name::from(name)))
          } else if let Some(name) = atom.strip_prefix('*') {
            is_name(name).then(|| Expression::Reference { name: Name::from(name), indirect: true })
          } else {
            is_name(atom).then(|| Expression::Reference { name: atom.clone(), indirect: false })
          }
        }

      };

    if expression.is_some() {
      self.position += 1;
    }
    Ok(expression)
  }

  /// Any expression that starts with a parenthesis, chosen by the atom at its head.
  fn parse_form(&mut self) -> Parsed<Expression> {
    let head =
      match self.form_head() {
        Some(head) => head,
        None       => return Ok(None)
      };

    let expression =
      match head {

        FUNCTION_KEYWORD => {
          let name = match self.tokens.get(self.position + 2) {
            Some(Token::Atom(name)) => name.clone(),
            _                       => Name::from(FUNCTION_KEYWORD)
          };
          return Err(CompileError::NestedFunction(name));
        }

        DECLARATION_KEYWORD | VARIABLE_KEYWORD => {
          let (name, value) = self.parse_declaration()?;
          Expression::Declaration { name, value: Box::new(value) }
        }

        ASSIGNMENT_KEYWORD => {
          self.position += 2;
          let (name, indirect) = self.expect_target(ASSIGNMENT_KEYWORD)?;
          let value = self.expect_expression(ASSIGNMENT_KEYWORD)?;
          self.expect(Token::RightParen, ASSIGNMENT_KEYWORD)?;
          Expression::Assignment { name, indirect, value: Box::new(value) }
        }

        CONDITIONAL_KEYWORD => {
          self.position += 2;
          let condition   = self.expect_expression(CONDITIONAL_KEYWORD)?;
          let then_branch = self.parse_block(CONDITIONAL_KEYWORD)?;
          let else_branch = self.parse_block(CONDITIONAL_KEYWORD)?;
          self.expect(Token::RightParen, CONDITIONAL_KEYWORD)?;
          Expression::Conditional { condition: Box::new(condition), then_branch, else_branch }
        }

        LOOP_KEYWORD => {
          self.position += 2;
          let condition = self.expect_expression(LOOP_KEYWORD)?;
          let body      = self.parse_sequence()?;
          self.expect(Token::RightParen, LOOP_KEYWORD)?;
          Expression::Loop { condition: Box::new(condition), body }
        }

        head if UnaryOperator::from_str(head).is_ok() || BinaryOperator::from_str(head).is_ok() => {
          self.parse_operation(head)?
        }

        head if is_name(head) => {
          self.position += 2;
          let arguments = self.parse_sequence()?;
          self.expect(Token::RightParen, "application")?;
          Expression::Application { function: Name::from(head), arguments }
        }

        _ => return Ok(None)

      };

    Ok(Some(expression))
  }

  /// '(' <operator> <expression>+ ')'
  fn parse_operation(&mut self, head: &str) -> Result<Expression, CompileError> {
    self.position += 2;
    let mut operands = self.parse_sequence()?;
    self.expect(Token::RightParen, "operation")?;

    let arity_error = |expected: usize, given: usize| CompileError::OperatorArity {
      operator: head.to_string(),
      expected,
      given
    };

    if let Ok(operator) = UnaryOperator::from_str(head) {
      return match operands.len() {
        1     => Ok(Expression::Unary { operator, operand: Box::new(operands.remove(0)) }),
        given => Err(arity_error(1, given))
      };
    }

    match (BinaryOperator::from_str(head), operands.len()) {
      (Ok(operator), 2) => {
        let right = operands.remove(1);
        let left  = operands.remove(0);
        Ok(Expression::Binary { operator, left: Box::new(left), right: Box::new(right) })
      }
      (_, given) => Err(arity_error(2, given))
    }
  }

  // endregion
}
