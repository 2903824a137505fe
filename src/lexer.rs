//! Line tokenizer and classifier. Produces pass-1 records that the
//! assembler walks twice; contains no label-table or ROM state.

use crate::error::LexError;
use crate::opcode::{Mnemonic, OperandShape, RegName};

const VALID_TOKEN_CHARS: &str =
    "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz._-:[],";
const VALID_PARAM_CHARS: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz._-";
const VALID_LABEL_CHARS: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz._-";
const VALID_LABEL_FIRST_CHARS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz._";

fn all_chars_in(s: &str, allowed: &str) -> bool {
    s.chars().all(|c| allowed.contains(c))
}

/// One classified parameter within a parameter block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Register(RegName),
    BracketedRegister(RegName),
    /// Signed decimal or unsigned-parsed-as-signed hex literal.
    Number(i32),
    BracketedNumber(i32),
    Label(String),
    BracketedLabel(String),
}

impl Param {
    /// The single-character shape code used to build a parameter block's
    /// rep string for shape deduction.
    fn code(&self) -> char {
        match self {
            Param::Register(_) => 'R',
            Param::BracketedRegister(_) => 'P',
            Param::Label(_) => 'W',
            Param::BracketedLabel(_) => 'M',
            Param::BracketedNumber(_) => 'M',
            Param::Number(v) => {
                if fits_byte(*v) {
                    'B'
                } else {
                    'W'
                }
            }
        }
    }

    /// `true` for any parameter whose numeric value comes from a label and
    /// is therefore not yet known until pass 1's label sweep runs.
    pub fn is_label_ref(&self) -> bool {
        matches!(self, Param::Label(_) | Param::BracketedLabel(_))
    }

    pub fn label_name(&self) -> Option<&str> {
        match self {
            Param::Label(name) | Param::BracketedLabel(name) => Some(name.as_str()),
            _ => None,
        }
    }
}

fn fits_byte(v: i32) -> bool {
    (0..=255).contains(&v) || (-128..=127).contains(&v)
}

/// One source line after classification: an optional label definition, the
/// mnemonic, and zero or more parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexedLine {
    pub label: Option<String>,
    pub mnemonic: Mnemonic,
    pub params: Vec<Param>,
}

fn classify_param(tok: &str) -> Result<Param, LexError> {
    let bracketed = tok.len() >= 3 && tok.starts_with('[') && tok.ends_with(']');
    let stripped = if bracketed { &tok[1..tok.len() - 1] } else { tok };

    if !all_chars_in(stripped, VALID_PARAM_CHARS) {
        return Err(LexError::InvalidParameter(tok.to_string()));
    }

    if let Some(reg) = RegName::from_str_exact(stripped) {
        return Ok(if bracketed {
            Param::BracketedRegister(reg)
        } else {
            Param::Register(reg)
        });
    }

    if let Some(hex) = stripped.strip_prefix("0x") {
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(LexError::InvalidParameter(tok.to_string()));
        }
        let value = i32::from_str_radix(hex, 16).map_err(|_| LexError::InvalidParameter(tok.to_string()))?;
        return Ok(if bracketed {
            Param::BracketedNumber(value)
        } else {
            Param::Number(value)
        });
    }

    let looks_decimal = {
        let rest = stripped.strip_prefix('-').unwrap_or(stripped);
        !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
    };
    if looks_decimal {
        let value: i32 = stripped
            .parse()
            .map_err(|_| LexError::InvalidParameter(tok.to_string()))?;
        return Ok(if bracketed {
            Param::BracketedNumber(value)
        } else {
            Param::Number(value)
        });
    }

    if all_chars_in(stripped, VALID_LABEL_CHARS)
        && stripped
            .chars()
            .next()
            .map(|c| VALID_LABEL_FIRST_CHARS.contains(c))
            .unwrap_or(false)
    {
        return Ok(if bracketed {
            Param::BracketedLabel(stripped.to_string())
        } else {
            Param::Label(stripped.to_string())
        });
    }

    Err(LexError::InvalidParameter(tok.to_string()))
}

/// Tokenize and classify one source line. Returns `Ok(None)` for a blank or
/// whitespace-only line (silently ignored).
pub fn lex_line(line: &str) -> Result<Option<LexedLine>, LexError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.is_empty() {
        return Ok(None);
    }

    for field in &fields {
        if !all_chars_in(field, VALID_TOKEN_CHARS) {
            return Err(LexError::InvalidChar {
                token: field.to_string(),
            });
        }
    }

    let mut idx = 0;
    let label = if fields[0].len() > 1 && fields[0].ends_with(':') {
        let stem = &fields[0][..fields[0].len() - 1];
        if !stem
            .chars()
            .next()
            .map(|c| VALID_LABEL_FIRST_CHARS.contains(c))
            .unwrap_or(false)
        {
            return Err(LexError::LabelStartsWithDigit(stem.to_string()));
        }
        if !all_chars_in(stem, VALID_LABEL_CHARS) {
            return Err(LexError::InvalidChar {
                token: fields[0].to_string(),
            });
        }
        idx = 1;
        Some(stem.to_string())
    } else {
        None
    };

    let mnemonic_field = fields
        .get(idx)
        .ok_or_else(|| LexError::UnknownMnemonic(String::new()))?;
    let mnemonic = Mnemonic::from_str_ci(mnemonic_field)
        .ok_or_else(|| LexError::UnknownMnemonic(mnemonic_field.to_string()))?;
    idx += 1;

    let mut params = Vec::new();
    if let Some(param_field) = fields.get(idx) {
        let parts: Vec<&str> = param_field.split(',').collect();
        if parts.len() > 3 {
            return Err(LexError::TooManyParameters(param_field.to_string()));
        }
        for part in parts {
            params.push(classify_param(part)?);
        }
        idx += 1;
    }

    if idx < fields.len() {
        return Err(LexError::TrailingTokens(fields[idx].to_string()));
    }

    Ok(Some(LexedLine {
        label,
        mnemonic,
        params,
    }))
}

/// Deduce the ordered list of candidate operand shapes for a parameter
/// block. `None` means the parameter combination is invalid.
pub fn deduce_shapes(params: &[Param]) -> Option<Vec<OperandShape>> {
    use OperandShape::*;
    if params.is_empty() {
        return Some(vec![Nil]);
    }
    if params.len() > 3 {
        return None;
    }
    let rep: String = params.iter().map(|p| p.code()).collect();
    let shapes = match rep.as_str() {
        "R" => vec![R],
        "B" => vec![B, W],
        "W" => vec![W],
        "RP" => vec![Rw],
        "RB" => vec![Rb, Rw],
        "M" => vec![M],
        "P" => vec![P],
        "BW" => vec![Bw],
        "RM" => vec![Rm],
        "MR" => vec![Mr],
        "RR" => vec![Rr],
        "RW" => vec![Rw],
        "PR" => vec![Rr],
        "BB" => vec![Bb, Bw, Wb],
        "BBB" => vec![Bbb],
        "RRR" => vec![Rrr],
        "WB" => vec![Wb],
        _ => return None,
    };
    Some(shapes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_line_is_ignored() {
        assert_eq!(lex_line("").unwrap(), None);
        assert_eq!(lex_line("   ").unwrap(), None);
    }

    #[test]
    fn label_and_mnemonic_and_params() {
        let line = lex_line("start: MOV R1,40").unwrap().unwrap();
        assert_eq!(line.label.as_deref(), Some("start"));
        assert_eq!(line.mnemonic, Mnemonic::Mov);
        assert_eq!(line.params, vec![Param::Register(RegName::R1), Param::Number(40)]);
    }

    #[test]
    fn no_label_just_mnemonic() {
        let line = lex_line("HALT").unwrap().unwrap();
        assert_eq!(line.label, None);
        assert_eq!(line.mnemonic, Mnemonic::Halt);
        assert!(line.params.is_empty());
    }

    #[test]
    fn label_starting_with_digit_is_rejected() {
        let err = lex_line("1bad: NOP").unwrap_err();
        assert!(matches!(err, LexError::LabelStartsWithDigit(_)));
    }

    #[test]
    fn bracketed_forms_classify_correctly() {
        let line = lex_line("MOV R1,[0x0100]").unwrap().unwrap();
        assert_eq!(
            line.params,
            vec![Param::Register(RegName::R1), Param::BracketedNumber(0x100)]
        );
    }

    #[test]
    fn byte_boundary_classification() {
        assert_eq!(classify_param("255").unwrap().code(), 'B');
        assert_eq!(classify_param("256").unwrap().code(), 'W');
        assert_eq!(classify_param("-128").unwrap().code(), 'B');
        assert_eq!(classify_param("-129").unwrap().code(), 'W');
    }

    #[test]
    fn too_many_parameters_rejected() {
        let err = lex_line("BC R1,R2,R3,R4").unwrap_err();
        assert!(matches!(err, LexError::TooManyParameters(_)));
    }

    #[test]
    fn deduce_shapes_prefers_declared_order() {
        assert_eq!(
            deduce_shapes(&[Param::Register(RegName::R1), Param::Number(5)]),
            Some(vec![OperandShape::Rb, OperandShape::Rw])
        );
    }
}
