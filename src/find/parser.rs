//! Find Command Parser
//!
//! Recognizes, by whitelist, the argument form of `find` and
//! `findleaves` invocations inside `$(shell ...)`. Anything outside
//! the whitelist makes the whole parse return `None`, and the caller
//! falls back to a real shell.

use crate::find::types::{FindCommand, FindCond, FindKind};

/// Internal token type for the recursive descent condition parser.
#[derive(Debug, Clone)]
enum Token {
    Cond(FindCond),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

/// Try to parse a shell command line as a find/findleaves invocation.
pub fn parse_find_command(cmd: &str) -> Option<FindCommand> {
    let mut tokens = tokenize(cmd)?;

    let mut fc = match strip_if_wrapper(&mut tokens) {
        Some(testdir) => {
            let mut fc = parse_body(&tokens)?;
            fc.testdir = Some(testdir);
            return Some(fc);
        }
        None => FindCommand::new(FindKind::Find),
    };

    // `test -d DIR && ...` / `cd DIR && ...` prefixes, in either order.
    loop {
        if tokens.len() >= 4 && tokens[0] == "test" && tokens[1] == "-d" && tokens[3] == "&&" {
            if fc.testdir.is_some() {
                return None;
            }
            fc.testdir = Some(tokens[2].clone());
            tokens.drain(..4);
            continue;
        }
        if tokens.len() >= 3 && tokens[0] == "cd" && tokens[2] == "&&" {
            if fc.chdir.is_some() {
                return None;
            }
            fc.chdir = Some(tokens[1].clone());
            tokens.drain(..3);
            continue;
        }
        break;
    }

    let mut parsed = parse_body(&tokens)?;
    parsed.testdir = fc.testdir;
    parsed.chdir = fc.chdir;
    Some(parsed)
}

/// `if [ -d DIR ] ; then BODY ; fi`: returns the tested directory and
/// leaves BODY in `tokens`.
fn strip_if_wrapper(tokens: &mut Vec<String>) -> Option<String> {
    if tokens.len() < 8 || tokens[0] != "if" {
        return None;
    }
    if tokens[1] != "[" || tokens[2] != "-d" || tokens[4] != "]" {
        return None;
    }
    if tokens[5] != ";" || tokens[6] != "then" {
        return None;
    }
    if tokens.last()? != "fi" {
        return None;
    }
    let n = tokens.len();
    if tokens[n - 2] != ";" {
        return None;
    }
    let testdir = tokens[3].clone();
    *tokens = tokens[7..n - 2].to_vec();
    Some(testdir)
}

fn parse_body(tokens: &[String]) -> Option<FindCommand> {
    let mut tokens = tokens.to_vec();

    // Trailing `2> /dev/null`.
    let mut redirect = false;
    if tokens.len() >= 2
        && tokens[tokens.len() - 2] == "2>"
        && tokens[tokens.len() - 1] == "/dev/null"
    {
        redirect = true;
        tokens.truncate(tokens.len() - 2);
    } else if tokens.last().is_some_and(|t| t == "2>/dev/null") {
        redirect = true;
        tokens.pop();
    }

    let head = tokens.first()?;
    let mut fc = if head == "find" {
        parse_find_args(&tokens[1..])?
    } else if head
        .rsplit('/')
        .next()
        .is_some_and(|base| base.starts_with("findleaves"))
    {
        parse_findleaves_args(&tokens[1..])?
    } else {
        return None;
    };
    fc.redirect_to_devnull = redirect;
    Some(fc)
}

fn parse_find_args(args: &[String]) -> Option<FindCommand> {
    let mut fc = FindCommand::new(FindKind::Find);
    let mut cond_tokens: Vec<Token> = Vec::new();
    let mut i = 0;

    while i < args.len() {
        let arg = args[i].as_str();
        match arg {
            "-L" => fc.follows_symlinks = true,
            "-maxdepth" | "-mindepth" => {
                i += 1;
                let n: usize = args.get(i)?.parse().ok()?;
                if arg == "-maxdepth" {
                    fc.max_depth = Some(n);
                } else {
                    fc.min_depth = Some(n);
                }
            }
            "-name" => {
                i += 1;
                cond_tokens.push(Token::Cond(FindCond::Name(args.get(i)?.clone())));
            }
            "-type" => {
                i += 1;
                let t = args.get(i)?;
                if t.len() != 1 || !"bcdplfs".contains(t.as_str()) {
                    return None;
                }
                cond_tokens.push(Token::Cond(FindCond::Type(t.chars().next()?)));
            }
            "-prune" => cond_tokens.push(Token::Cond(FindCond::Prune)),
            "-print" => cond_tokens.push(Token::Cond(FindCond::Print)),
            "-not" | "!" | "\\!" => cond_tokens.push(Token::Not),
            "-and" | "-a" => cond_tokens.push(Token::And),
            "-or" | "-o" => cond_tokens.push(Token::Or),
            "(" | "\\(" => cond_tokens.push(Token::LParen),
            ")" | "\\)" => cond_tokens.push(Token::RParen),
            _ => {
                // A path operand, only before any condition token.
                if arg.starts_with('-')
                    || !cond_tokens.is_empty()
                    || arg.contains(['&', '>'])
                {
                    return None;
                }
                fc.finddirs.push(arg.to_string());
            }
        }
        i += 1;
    }

    if fc.finddirs.is_empty() {
        fc.finddirs.push(".".to_string());
    }
    if !cond_tokens.is_empty() {
        let mut pos = 0;
        let cond = parse_or(&cond_tokens, &mut pos)?;
        if pos != cond_tokens.len() {
            return None;
        }
        fc.cond = Some(cond);
    }
    Some(fc)
}

fn parse_findleaves_args(args: &[String]) -> Option<FindCommand> {
    let mut fc = FindCommand::new(FindKind::FindLeaves);
    let mut positional: Vec<String> = Vec::new();

    for arg in args {
        if let Some(name) = arg.strip_prefix("--prune=") {
            fc.prunes.push(name.to_string());
        } else if let Some(n) = arg.strip_prefix("--mindepth=") {
            fc.min_depth = Some(n.parse().ok()?);
        } else if let Some(dir) = arg.strip_prefix("--dir=") {
            fc.finddirs.push(dir.to_string());
        } else if arg.starts_with("--") {
            return None;
        } else {
            positional.push(arg.clone());
        }
    }

    // The last positional is the filename, the rest are roots.
    let filename = positional.pop()?;
    fc.filename = Some(filename);
    fc.finddirs.extend(positional);
    if fc.finddirs.is_empty() {
        return None;
    }
    fc.follows_symlinks = true;
    Some(fc)
}

// Condition grammar, precedence low to high: OR, AND (implicit
// between adjacent terms), NOT, parentheses.

fn parse_or(tokens: &[Token], pos: &mut usize) -> Option<FindCond> {
    let mut left = parse_and(tokens, pos)?;
    while *pos < tokens.len() {
        if matches!(tokens[*pos], Token::Or) {
            *pos += 1;
            let right = parse_and(tokens, pos)?;
            left = FindCond::Or(Box::new(left), Box::new(right));
        } else {
            break;
        }
    }
    Some(left)
}

fn parse_and(tokens: &[Token], pos: &mut usize) -> Option<FindCond> {
    let mut left = parse_unary(tokens, pos)?;
    while *pos < tokens.len() {
        match &tokens[*pos] {
            Token::And => {
                *pos += 1;
                let right = parse_unary(tokens, pos)?;
                left = FindCond::And(Box::new(left), Box::new(right));
            }
            Token::Cond(_) | Token::Not | Token::LParen => {
                let right = parse_unary(tokens, pos)?;
                left = FindCond::And(Box::new(left), Box::new(right));
            }
            _ => break,
        }
    }
    Some(left)
}

fn parse_unary(tokens: &[Token], pos: &mut usize) -> Option<FindCond> {
    if *pos < tokens.len() && matches!(tokens[*pos], Token::Not) {
        *pos += 1;
        let inner = parse_unary(tokens, pos)?;
        return Some(FindCond::Not(Box::new(inner)));
    }
    parse_primary(tokens, pos)
}

fn parse_primary(tokens: &[Token], pos: &mut usize) -> Option<FindCond> {
    match tokens.get(*pos)? {
        Token::LParen => {
            *pos += 1;
            let inner = parse_or(tokens, pos)?;
            if !matches!(tokens.get(*pos), Some(Token::RParen)) {
                return None;
            }
            *pos += 1;
            Some(inner)
        }
        Token::Cond(c) => {
            let c = c.clone();
            *pos += 1;
            Some(c)
        }
        _ => None,
    }
}

/// Split a command into shell words, handling quotes and backslash
/// escapes. Any other shell syntax (pipes, substitutions, globs we do
/// not understand) rejects the command.
fn tokenize(cmd: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut cur = String::new();
    let mut chars = cmd.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ' ' | '\t' | '\n' => {
                if !cur.is_empty() {
                    tokens.push(std::mem::take(&mut cur));
                }
            }
            '\'' => loop {
                match chars.next() {
                    Some('\'') => break,
                    Some(ch) => cur.push(ch),
                    None => return None,
                }
            },
            '"' => loop {
                match chars.next() {
                    Some('"') => break,
                    Some(ch) => cur.push(ch),
                    None => return None,
                }
            },
            '\\' => {
                // Keep the backslash: `\(` and `\!` arrive as escaped
                // tokens the argument parser expects.
                cur.push('\\');
                if let Some(ch) = chars.next() {
                    cur.push(ch);
                }
            }
            ';' => {
                if !cur.is_empty() {
                    tokens.push(std::mem::take(&mut cur));
                }
                tokens.push(";".to_string());
            }
            '|' | '`' | '$' | '<' => return None,
            '>' | '&' => {
                // `&&` and `2>` survive as words; the argument parsers
                // reject any other use.
                cur.push(c);
            }
            _ => cur.push(c),
        }
    }
    if !cur.is_empty() {
        tokens.push(cur);
    }
    Some(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(cmd: &str) -> FindCommand {
        parse_find_command(cmd).expect("command should parse")
    }

    #[test]
    fn test_plain_find() {
        let fc = parse("find src");
        assert_eq!(fc.kind, FindKind::Find);
        assert_eq!(fc.finddirs, vec!["src"]);
        assert!(fc.cond.is_none());
    }

    #[test]
    fn test_default_dir_is_dot() {
        let fc = parse("find -name '*.c'");
        assert_eq!(fc.finddirs, vec!["."]);
    }

    #[test]
    fn test_name_and_type() {
        let fc = parse("find src -name '*.mk' -type f");
        match fc.cond.unwrap() {
            FindCond::And(l, r) => {
                assert_eq!(*l, FindCond::Name("*.mk".into()));
                assert_eq!(*r, FindCond::Type('f'));
            }
            c => panic!("Expected And, got {:?}", c),
        }
    }

    #[test]
    fn test_or_and_not() {
        let fc = parse("find . -name a -o \\! -name b");
        match fc.cond.unwrap() {
            FindCond::Or(l, r) => {
                assert_eq!(*l, FindCond::Name("a".into()));
                assert!(matches!(*r, FindCond::Not(_)));
            }
            c => panic!("Expected Or, got {:?}", c),
        }
    }

    #[test]
    fn test_parens_group() {
        let fc = parse("find . \\( -name a -o -name b \\) -type d");
        match fc.cond.unwrap() {
            FindCond::And(l, r) => {
                assert!(matches!(*l, FindCond::Or(_, _)));
                assert_eq!(*r, FindCond::Type('d'));
            }
            c => panic!("Expected And, got {:?}", c),
        }
    }

    #[test]
    fn test_prune_print_pattern() {
        let fc = parse("find . -name .git -prune -o -print");
        assert!(fc.cond.unwrap().has_print());
    }

    #[test]
    fn test_depth_and_symlink_flags() {
        let fc = parse("find -L sub -maxdepth 2 -mindepth 1");
        assert!(fc.follows_symlinks);
        assert_eq!(fc.max_depth, Some(2));
        assert_eq!(fc.min_depth, Some(1));
    }

    #[test]
    fn test_chdir_prefix() {
        let fc = parse("cd sub && find . -type f");
        assert_eq!(fc.chdir.as_deref(), Some("sub"));
        assert_eq!(fc.finddirs, vec!["."]);
        let fc = parse("cd out && find lib");
        assert_eq!(fc.chdir.as_deref(), Some("out"));
        assert_eq!(fc.finddirs, vec!["lib"]);
    }

    #[test]
    fn test_testdir_prefix() {
        let fc = parse("test -d src && find src -type d");
        assert_eq!(fc.testdir.as_deref(), Some("src"));
    }

    #[test]
    fn test_if_wrapper() {
        let fc = parse("if [ -d art ] ; then find art -name '*.java' ; fi");
        assert_eq!(fc.testdir.as_deref(), Some("art"));
        assert_eq!(fc.finddirs, vec!["art"]);
    }

    #[test]
    fn test_devnull_redirect() {
        let fc = parse("find x -name y 2> /dev/null");
        assert!(fc.redirect_to_devnull);
        let fc = parse("find x 2>/dev/null");
        assert!(fc.redirect_to_devnull);
    }

    #[test]
    fn test_findleaves() {
        let fc = parse("build/tools/findleaves.py --prune=.git --mindepth=2 art dalvik Android.mk");
        assert_eq!(fc.kind, FindKind::FindLeaves);
        assert_eq!(fc.prunes, vec![".git"]);
        assert_eq!(fc.min_depth, Some(2));
        assert_eq!(fc.finddirs, vec!["art", "dalvik"]);
        assert_eq!(fc.filename.as_deref(), Some("Android.mk"));
    }

    #[test]
    fn test_rejects_unknown_predicates() {
        assert!(parse_find_command("find . -newer x").is_none());
        assert!(parse_find_command("find . -exec rm {} ;").is_none());
        assert!(parse_find_command("ls -la").is_none());
        assert!(parse_find_command("find . | head").is_none());
    }
}
