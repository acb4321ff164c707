// Formula parser - converts formula text into an AST
// Supports: numbers, strings, cell refs (A1, $A$1), ranges (A1:B5), functions,
// arithmetic (+ - * / ^ %), comparison (< > = <= >= <>) and concatenation (&).
// Arguments may be separated by `,` or `;`.

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Zero-based cell coordinates. Anchors only matter for shifting, which
    /// happens on the text before parsing.
    CellRef { col: usize, row: usize },
    Range {
        start_col: usize,
        start_row: usize,
        end_col: usize,
        end_row: usize,
    },
    Function { name: String, args: Vec<Expr> },
    BinaryOp { op: Op, left: Box<Expr>, right: Box<Expr> },
    /// Bare identifier that is not a function call. No names are defined,
    /// so evaluating one is always `#NAME?`.
    Name(String),
    /// Omitted argument (`=IF(A1,,2)`).
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Concat,
    Lt,
    Gt,
    Eq,
    LtEq,
    GtEq,
    NotEq,
}

/// Parse `=expr`.
pub fn parse(formula: &str) -> Result<Expr, String> {
    let formula = formula.trim();
    let Some(input) = formula.strip_prefix('=') else {
        return Err("Formula must start with =".to_string());
    };

    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err("Empty formula".to_string());
    }
    let (expr, pos) = parse_comparison(&tokens, 0)?;
    if pos != tokens.len() {
        return Err(format!("Unexpected token at position {}", pos));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    StringLit(String),
    CellRef { col: usize, row: usize },
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Percent,
    Ampersand,
    LParen,
    RParen,
    Colon,
    Comma,
    Lt,
    Gt,
    Eq,
    LtEq,
    GtEq,
    NotEq,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => { chars.next(); }
            '+' => { tokens.push(Token::Plus); chars.next(); }
            '-' => { tokens.push(Token::Minus); chars.next(); }
            '*' => { tokens.push(Token::Star); chars.next(); }
            '/' => { tokens.push(Token::Slash); chars.next(); }
            '^' => { tokens.push(Token::Caret); chars.next(); }
            '%' => { tokens.push(Token::Percent); chars.next(); }
            '&' => { tokens.push(Token::Ampersand); chars.next(); }
            '(' => { tokens.push(Token::LParen); chars.next(); }
            ')' => { tokens.push(Token::RParen); chars.next(); }
            ':' => { tokens.push(Token::Colon); chars.next(); }
            ',' | ';' => { tokens.push(Token::Comma); chars.next(); }
            '=' => { tokens.push(Token::Eq); chars.next(); }
            '<' => {
                chars.next();
                match chars.peek() {
                    Some('=') => { tokens.push(Token::LtEq); chars.next(); }
                    Some('>') => { tokens.push(Token::NotEq); chars.next(); }
                    _ => tokens.push(Token::Lt),
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    tokens.push(Token::GtEq);
                    chars.next();
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        // "" inside a literal is an escaped quote
                        Some('"') if chars.peek() == Some(&'"') => {
                            chars.next();
                            s.push('"');
                        }
                        Some('"') => break,
                        Some(ch) => s.push(ch),
                        None => return Err("Unterminated string literal".to_string()),
                    }
                }
                tokens.push(Token::StringLit(s));
            }
            '0'..='9' | '.' => {
                let mut num_str = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num_str.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| format!("Invalid number: {}", num_str))?;
                tokens.push(Token::Number(num));
            }
            c if c == '$' || c.is_alphabetic() => {
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' || ch == '$' || ch == '.' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let upper = ident.to_uppercase();
                let is_call = chars.peek() == Some(&'(');
                if let Some(token) = try_parse_cell_ref(&upper).filter(|_| !is_call) {
                    tokens.push(token);
                } else if upper.contains('$') {
                    return Err(format!("Invalid cell reference: {}", ident));
                } else {
                    tokens.push(Token::Ident(upper));
                }
            }
            _ => return Err(format!("Unexpected character: {}", c)),
        }
    }

    Ok(tokens)
}

/// `[$]LETTERS[$]DIGITS` with a 1-based row.
fn try_parse_cell_ref(s: &str) -> Option<Token> {
    let rest = s.strip_prefix('$').unwrap_or(s);
    let letters_end = rest.find(|c: char| !c.is_ascii_uppercase())?;
    let (letters, rest) = rest.split_at(letters_end);
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let digits = rest.strip_prefix('$').unwrap_or(rest);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let row: usize = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    let col = letters
        .chars()
        .fold(0usize, |acc, c| acc * 26 + (c as usize - 'A' as usize + 1))
        - 1;
    Some(Token::CellRef { col, row: row - 1 })
}

// Precedence, lowest first: comparison, &, + -, * /, ^, %, primary.

fn parse_comparison(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_concat(tokens, pos)?;
    while let Some(op) = tokens.get(pos).and_then(comparison_op) {
        let (right, next) = parse_concat(tokens, pos + 1)?;
        left = binary(op, left, right);
        pos = next;
    }
    Ok((left, pos))
}

fn comparison_op(token: &Token) -> Option<Op> {
    match token {
        Token::Lt => Some(Op::Lt),
        Token::Gt => Some(Op::Gt),
        Token::Eq => Some(Op::Eq),
        Token::LtEq => Some(Op::LtEq),
        Token::GtEq => Some(Op::GtEq),
        Token::NotEq => Some(Op::NotEq),
        _ => None,
    }
}

fn parse_concat(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_add_sub(tokens, pos)?;
    while tokens.get(pos) == Some(&Token::Ampersand) {
        let (right, next) = parse_add_sub(tokens, pos + 1)?;
        left = binary(Op::Concat, left, right);
        pos = next;
    }
    Ok((left, pos))
}

fn parse_add_sub(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_mul_div(tokens, pos)?;
    loop {
        let op = match tokens.get(pos) {
            Some(Token::Plus) => Op::Add,
            Some(Token::Minus) => Op::Sub,
            _ => break,
        };
        let (right, next) = parse_mul_div(tokens, pos + 1)?;
        left = binary(op, left, right);
        pos = next;
    }
    Ok((left, pos))
}

fn parse_mul_div(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_power(tokens, pos)?;
    loop {
        let op = match tokens.get(pos) {
            Some(Token::Star) => Op::Mul,
            Some(Token::Slash) => Op::Div,
            _ => break,
        };
        let (right, next) = parse_power(tokens, pos + 1)?;
        left = binary(op, left, right);
        pos = next;
    }
    Ok((left, pos))
}

// Right-associative
fn parse_power(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (base, pos) = parse_percent(tokens, pos)?;
    if tokens.get(pos) == Some(&Token::Caret) {
        let (exponent, next) = parse_power(tokens, pos + 1)?;
        return Ok((binary(Op::Pow, base, exponent), next));
    }
    Ok((base, pos))
}

// Postfix %, desugars to * 0.01
fn parse_percent(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut expr, mut pos) = parse_primary(tokens, pos)?;
    while tokens.get(pos) == Some(&Token::Percent) {
        expr = binary(Op::Mul, expr, Expr::Number(0.01));
        pos += 1;
    }
    Ok((expr, pos))
}

fn parse_primary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let Some(token) = tokens.get(pos) else {
        return Err("Unexpected end of expression".to_string());
    };

    match token {
        Token::Number(n) => Ok((Expr::Number(*n), pos + 1)),
        Token::StringLit(s) => Ok((Expr::Text(s.clone()), pos + 1)),
        Token::CellRef { col, row } => {
            if let (Some(Token::Colon), Some(Token::CellRef { col: end_col, row: end_row })) =
                (tokens.get(pos + 1), tokens.get(pos + 2))
            {
                return Ok((
                    Expr::Range {
                        start_col: *col.min(end_col),
                        start_row: *row.min(end_row),
                        end_col: *col.max(end_col),
                        end_row: *row.max(end_row),
                    },
                    pos + 3,
                ));
            }
            Ok((Expr::CellRef { col: *col, row: *row }, pos + 1))
        }
        Token::Ident(name) => {
            if name == "TRUE" {
                return Ok((Expr::Boolean(true), pos + 1));
            }
            if name == "FALSE" {
                return Ok((Expr::Boolean(false), pos + 1));
            }
            if tokens.get(pos + 1) == Some(&Token::LParen) {
                let (args, next) = parse_function_args(tokens, pos + 2)?;
                return Ok((Expr::Function { name: name.clone(), args }, next));
            }
            Ok((Expr::Name(name.clone()), pos + 1))
        }
        Token::LParen => {
            let (expr, pos) = parse_comparison(tokens, pos + 1)?;
            match tokens.get(pos) {
                Some(Token::RParen) => Ok((expr, pos + 1)),
                _ => Err("Missing closing parenthesis".to_string()),
            }
        }
        Token::Plus => parse_percent(tokens, pos + 1),
        Token::Minus => {
            let (expr, pos) = parse_percent(tokens, pos + 1)?;
            Ok((binary(Op::Sub, Expr::Number(0.0), expr), pos))
        }
        _ => Err(format!("Unexpected token at position {}", pos)),
    }
}

fn parse_function_args(tokens: &[Token], pos: usize) -> Result<(Vec<Expr>, usize), String> {
    let mut args = Vec::new();
    let mut pos = pos;

    if tokens.get(pos) == Some(&Token::RParen) {
        return Ok((args, pos + 1));
    }

    loop {
        let arg = match tokens.get(pos) {
            Some(Token::Comma) | Some(Token::RParen) => Expr::Empty,
            _ => {
                let (arg, next) = parse_comparison(tokens, pos)?;
                pos = next;
                arg
            }
        };
        args.push(arg);

        match tokens.get(pos) {
            Some(Token::RParen) => return Ok((args, pos + 1)),
            Some(Token::Comma) => pos += 1,
            Some(_) => return Err("Expected comma or closing parenthesis".to_string()),
            None => return Err("Missing closing parenthesis in function call".to_string()),
        }
    }
}

fn binary(op: Op, left: Expr, right: Expr) -> Expr {
    Expr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
