// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! Small integer expressions accepted for lengths and buffer placeholders in catalog files.
//!
//! ```text
//! addr   := ("RX" | "TX") "(" expr ")"
//! expr   := term (("+" | "-") term)*
//! term   := factor ("*" factor)*
//! factor := number | symbol | "(" expr ")"
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case},
    character::complete::{alpha1, alphanumeric1, char, digit1, hex_digit1, multispace0},
    combinator::{all_consuming, map, map_res, recognize},
    multi::{fold_many0, many0_count},
    sequence::{delimited, pair, preceded},
    IResult,
};
use spitest_def::{Region, MAX_SIZE, MAX_SIZE_PLUS, PAGE_SIZE};

use crate::addr::BufAddr;
use crate::error::CatalogError;

fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn number(input: &str) -> IResult<&str, i64> {
    alt((
        map_res(preceded(tag_no_case("0x"), hex_digit1), |digits| {
            i64::from_str_radix(digits, 16)
        }),
        map_res(digit1, str::parse::<i64>),
    ))(input)
}

fn lookup(name: &str) -> Option<i64> {
    let value = match name {
        "PAGE_SIZE" => PAGE_SIZE,
        "MAX_SIZE" => MAX_SIZE,
        "MAX_SIZE_PLUS" => MAX_SIZE_PLUS,
        _ => return None,
    };
    Some(value as i64)
}

fn symbol(input: &str) -> IResult<&str, i64> {
    map_res(
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0_count(alt((alphanumeric1, tag("_")))),
        )),
        |name: &str| lookup(name).ok_or(()),
    )(input)
}

fn factor(input: &str) -> IResult<&str, i64> {
    ws(alt((
        number,
        symbol,
        delimited(char('('), expr, char(')')),
    )))(input)
}

fn term(input: &str) -> IResult<&str, i64> {
    let (input, init) = factor(input)?;
    fold_many0(
        preceded(char('*'), factor),
        move || init,
        |acc, value| acc.saturating_mul(value),
    )(input)
}

fn expr(input: &str) -> IResult<&str, i64> {
    let (input, init) = term(input)?;
    fold_many0(
        pair(alt((char('+'), char('-'))), term),
        move || init,
        |acc, (op, value)| match op {
            '+' => acc.saturating_add(value),
            _ => acc.saturating_sub(value),
        },
    )(input)
}

fn region(input: &str) -> IResult<&str, Region> {
    ws(alt((
        map(tag_no_case("RX"), |_| Region::Rx),
        map(tag_no_case("TX"), |_| Region::Tx),
    )))(input)
}

fn addr(input: &str) -> IResult<&str, (Region, i64)> {
    pair(region, delimited(char('('), expr, ws(char(')'))))(input)
}

fn syntax_error(input: &str, err: nom::Err<nom::error::Error<&str>>) -> CatalogError {
    let message = match err {
        nom::Err::Error(err) | nom::Err::Failure(err) if err.input.is_empty() => {
            "unexpected end of expression".to_string()
        }
        nom::Err::Error(err) | nom::Err::Failure(err) => {
            format!("unexpected input at {:?}", err.input)
        }
        nom::Err::Incomplete(_) => "incomplete expression".to_string(),
    };
    CatalogError::Expression {
        input: input.to_string(),
        message,
    }
}

fn to_usize(input: &str, value: i64) -> Result<usize, CatalogError> {
    usize::try_from(value).map_err(|_| CatalogError::OutOfBounds {
        input: input.to_string(),
        value,
    })
}

/// Evaluate a length or offset expression such as `2 * PAGE_SIZE + 3`.
pub fn parse_len(input: &str) -> Result<usize, CatalogError> {
    match all_consuming(expr)(input) {
        Ok((_, value)) => to_usize(input, value),
        Err(err) => Err(syntax_error(input, err)),
    }
}

/// Parse a buffer placeholder such as `TX(PAGE_SIZE - 4)`.
pub fn parse_addr(input: &str) -> Result<BufAddr, CatalogError> {
    match all_consuming(addr)(input) {
        Ok((_, (Region::Rx, offset))) => Ok(BufAddr::Rx(to_usize(input, offset)?)),
        Ok((_, (Region::Tx, offset))) => Ok(BufAddr::Tx(to_usize(input, offset)?)),
        Err(err) => Err(syntax_error(input, err)),
    }
}
