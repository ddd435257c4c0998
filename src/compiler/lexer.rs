/*!
  Splits source text into tokens. The language is given by the following lexical rules:
    ```text
    <token>    ::= '(' | ')' | <integer> | <atom>
    <integer>  ::= '-'? ( [0-9]+ | '0x' [0-9a-fA-F]+ )
    <atom>     ::= [^ \t\r\n();]+
    ```
  An atom that reads as an integer is an integer. Whitespace and comments, which run from `;`
  to the end of the line, separate tokens and are otherwise ignored.
*/

use std::fmt::{Display, Formatter};

use nom::{
  branch::alt,
  bytes::complete::take_while1,
  character::complete::{char as one_char, multispace1, not_line_ending},
  combinator::{map, value},
  multi::many0,
  sequence::pair,
  IResult
};

use super::Name;
use crate::bytecode::{parse_word, Word};
use crate::error::CompileError;

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Token {
  LeftParen,
  RightParen,
  Integer(Word),
  /// Any other run of non-delimiter characters: names, keywords, operators, `@symbols`
  /// and `*pointers`.
  Atom(Name),
}

impl Display for Token {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Token::LeftParen      => write!(f, "("),
      Token::RightParen     => write!(f, ")"),
      Token::Integer(value) => write!(f, "{}", value),
      Token::Atom(atom)     => write!(f, "{}", atom)
    }
  }
}

fn is_atom_char(c: char) -> bool {
  !c.is_whitespace() && c != '(' && c != ')' && c != ';'
}

/// <eol_comment> ::= ';' [^\n\r]*
fn peol_comment(text: &str) -> IResult<&str, ()> {
  value((), pair(one_char(';'), not_line_ending))(text)
}

fn pskip(text: &str) -> IResult<&str, ()> {
  value((), many0(alt((value((), multispace1), peol_comment))))(text)
}

fn ptoken(text: &str) -> IResult<&str, Token> {
  alt((
    value(Token::LeftParen,  one_char('(')),
    value(Token::RightParen, one_char(')')),
    map(take_while1(is_atom_char), |atom: &str| {
      match parse_word(atom) {
        Some(integer) => Token::Integer(integer),
        None          => Token::Atom(Name::from(atom))
      }
    })
  ))(text)
}

fn skip(text: &str) -> &str {
  match pskip(text) {
    Ok((rest, _)) => rest,
    Err(_)        => text
  }
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, CompileError> {
  let mut tokens = Vec::new();
  let mut rest   = skip(source);

  while !rest.is_empty() {
    match ptoken(rest) {

      Ok((remaining, token)) => {
        tokens.push(token);
        rest = skip(remaining);
      }

      Err(_) => {
        let found = rest.chars().next().unwrap_or_default();
        return Err(CompileError::Syntax {
          position: tokens.len(),
          message : format!("unexpected character `{}`", found)
        });
      }

    }
  }

  Ok(tokens)
}
