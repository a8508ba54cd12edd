//! Recursive-descent parser for attribute layout strings.

use crate::error::{PackError, Result};
use crate::layout::element::{
    ElemId, IntegralKind, LayoutArena, LayoutElement, RefKind, UintType, UnionCase,
};

/// Parse a layout string into an element arena with calls resolved.
pub fn parse_layout(layout: &str) -> Result<LayoutArena> {
    Parser::new(layout).parse()
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    arena: LayoutArena,
}

impl<'a> Parser<'a> {
    const fn new(input: &'a str) -> Self {
        Self { input, pos: 0, arena: LayoutArena { elements: Vec::new(), top: Vec::new(), callables: Vec::new(), band_count: 0 } }
    }

    fn parse(mut self) -> Result<LayoutArena> {
        let top = self.parse_body(true)?;
        if self.pos < self.input.len() {
            return Err(self.fail("trailing characters"));
        }
        self.arena.top = top;
        self.resolve_calls()?;
        Ok(self.arena)
    }

    fn fail(&self, reason: &str) -> PackError {
        PackError::InvalidLayout {
            layout: self.input.to_string(),
            reason: format!("{reason} at position {}", self.pos),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn consume(&mut self, expected: char) -> Result<()> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.fail(&format!("expected {expected:?}, found {c:?}"))),
            None => Err(self.fail(&format!("expected {expected:?}, found end of layout"))),
        }
    }

    fn parse_uint(&mut self) -> Result<UintType> {
        match self.bump() {
            Some(c) => UintType::from_char(c)
                .ok_or_else(|| self.fail(&format!("expected size letter, found {c:?}"))),
            None => Err(self.fail("expected size letter, found end of layout")),
        }
    }

    fn parse_number(&mut self) -> Result<i32> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump();
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        self.input[start..self.pos]
            .parse::<i32>()
            .map_err(|_| self.fail("expected number"))
    }

    fn new_band(&mut self) -> usize {
        let band = self.arena.band_count;
        self.arena.band_count += 1;
        band
    }

    fn push(&mut self, element: LayoutElement) -> ElemId {
        self.arena.elements.push(element);
        self.arena.elements.len() - 1
    }

    /// Parse a sequence of elements until the closing bracket (or, at
    /// top level, the end of input). Bracketed bodies at top level are
    /// callables.
    fn parse_body(&mut self, top_level: bool) -> Result<Vec<ElemId>> {
        let mut body = Vec::new();
        while let Some(c) = self.peek() {
            if c == ']' {
                break;
            }
            if c == '[' && top_level {
                self.consume('[')?;
                let callable_body = self.parse_body(false)?;
                self.consume(']')?;
                let id = self.push(LayoutElement::Callable {
                    body: callable_body,
                    backwards: false,
                    backwards_index: None,
                });
                self.arena.callables.push(id);
                body.push(id);
                continue;
            }
            body.push(self.parse_element()?);
        }
        Ok(body)
    }

    fn parse_element(&mut self) -> Result<ElemId> {
        let c = self.peek().ok_or_else(|| self.fail("expected element"))?;
        match c {
            'B' | 'H' | 'I' | 'V' => {
                self.bump();
                self.integral(c.to_string(), IntegralKind::Plain)
            }
            'S' => {
                self.bump();
                let size = self.parse_uint()?;
                self.integral(format!("S{}", size_char(size)), IntegralKind::Signed)
            }
            'F' => {
                self.bump();
                let size = self.parse_uint()?;
                self.integral(format!("F{}", size_char(size)), IntegralKind::Flag)
            }
            'P' => {
                self.bump();
                if self.peek() == Some('O') {
                    self.bump();
                    let size = self.parse_uint()?;
                    self.integral(format!("PO{}", size_char(size)), IntegralKind::BciOffset)
                } else {
                    let size = self.parse_uint()?;
                    self.integral(format!("P{}", size_char(size)), IntegralKind::Bci)
                }
            }
            'O' => {
                self.bump();
                if self.peek() == Some('S') {
                    self.bump();
                    let size = self.parse_uint()?;
                    self.integral(format!("OS{}", size_char(size)), IntegralKind::SignedOffset)
                } else {
                    let size = self.parse_uint()?;
                    self.integral(format!("O{}", size_char(size)), IntegralKind::Offset)
                }
            }
            'K' | 'R' => self.parse_reference(c),
            'N' => {
                self.bump();
                let size = self.parse_uint()?;
                self.consume('[')?;
                let body = self.parse_body(false)?;
                self.consume(']')?;
                let count_band = self.new_band();
                Ok(self.push(LayoutElement::Replication {
                    tag: format!("N{}", size_char(size)),
                    uint: size,
                    count_band,
                    body,
                }))
            }
            'T' => self.parse_union(),
            '(' => {
                self.consume('(')?;
                let index = self.parse_number()?;
                self.consume(')')?;
                Ok(self.push(LayoutElement::Call { index, target: 0 }))
            }
            '[' => {
                // A bracketed body below top level is still a callable
                self.consume('[')?;
                let body = self.parse_body(false)?;
                self.consume(']')?;
                let id = self.push(LayoutElement::Callable {
                    body,
                    backwards: false,
                    backwards_index: None,
                });
                self.arena.callables.push(id);
                Ok(id)
            }
            other => Err(self.fail(&format!("unknown element {other:?}"))),
        }
    }

    fn integral(&mut self, tag: String, kind: IntegralKind) -> Result<ElemId> {
        let uint = match tag.chars().last().and_then(UintType::from_char) {
            Some(u) => u,
            None => return Err(self.fail("integral without size")),
        };
        let band = self.new_band();
        Ok(self.push(LayoutElement::Integral { tag, kind, uint, band }))
    }

    fn parse_reference(&mut self, family: char) -> Result<ElemId> {
        self.bump();
        let type_char = self.bump().ok_or_else(|| self.fail("reference without type"))?;
        let mut nullable = false;
        if family == 'R' && self.peek() == Some('N') {
            self.bump();
            nullable = true;
        }
        let uint = self.parse_uint()?;
        let kind = match (family, type_char) {
            ('K', 'I') => RefKind::KInt,
            ('K', 'J') => RefKind::KLong,
            ('K', 'F') => RefKind::KFloat,
            ('K', 'D') => RefKind::KDouble,
            ('K', 'S') => RefKind::KString,
            ('K', 'Q') => RefKind::KQuery,
            ('R', 'C') => RefKind::RClass,
            ('R', 'S') => RefKind::RSignature,
            ('R', 'D') => RefKind::RDescr,
            ('R', 'F') => RefKind::RField,
            ('R', 'M') => RefKind::RMethod,
            ('R', 'I') => RefKind::RIMethod,
            ('R', 'U') => RefKind::RUtf8,
            ('R', 'Q') => RefKind::RQuery,
            _ => return Err(self.fail(&format!("unknown reference {family}{type_char}"))),
        };
        let tag = format!(
            "{family}{type_char}{}{}",
            if nullable { "N" } else { "" },
            size_char(uint)
        );
        let band = self.new_band();
        Ok(self.push(LayoutElement::Reference { tag, kind, nullable, uint, band }))
    }

    fn parse_union(&mut self) -> Result<ElemId> {
        self.consume('T')?;
        let signed = self.peek() == Some('S');
        if signed {
            self.bump();
        }
        let uint = self.parse_uint()?;
        let tag = format!("T{}{}", if signed { "S" } else { "" }, size_char(uint));
        let tag_band = self.new_band();

        let mut cases = Vec::new();
        let mut default_body = Vec::new();
        loop {
            self.consume('(')?;
            if self.peek() == Some(')') {
                // the default case ends the union
                self.consume(')')?;
                self.consume('[')?;
                default_body = self.parse_body(false)?;
                self.consume(']')?;
                break;
            }
            let mut values = vec![self.parse_number()?];
            while self.peek() == Some(',') {
                self.consume(',')?;
                values.push(self.parse_number()?);
            }
            self.consume(')')?;
            self.consume('[')?;
            let body = self.parse_body(false)?;
            self.consume(']')?;
            cases.push(UnionCase { values, body });
            if self.peek() != Some('(') {
                return Err(self.fail("union without default case"));
            }
        }
        Ok(self.push(LayoutElement::Union { tag, signed, uint, tag_band, cases, default_body }))
    }

    /// Resolve every call to its callable: index 0 is the enclosing
    /// callable, positive indexes skip forward, negative skip backward.
    /// Targets of negative calls become backwards callables with
    /// contiguous indexes.
    fn resolve_calls(&mut self) -> Result<()> {
        let callables = self.arena.callables.clone();
        // Calls are only meaningful inside a callable.
        let mut stray: Vec<ElemId> = self
            .arena
            .top
            .iter()
            .copied()
            .filter(|id| !callables.contains(id))
            .collect();
        while let Some(id) = stray.pop() {
            match &self.arena.elements[id] {
                LayoutElement::Call { index, .. } => {
                    let index = *index;
                    self.pos = 0;
                    return Err(self.fail(&format!("call ({index}) outside any callable")));
                }
                LayoutElement::Replication { body, .. } => stray.extend(body),
                LayoutElement::Union { cases, default_body, .. } => {
                    for case in cases {
                        stray.extend(&case.body);
                    }
                    stray.extend(default_body);
                }
                _ => {}
            }
        }
        // (call element, enclosing callable position, index)
        let mut calls = Vec::new();
        for (pos, &callable) in callables.iter().enumerate() {
            let LayoutElement::Callable { body, .. } = &self.arena.elements[callable] else {
                continue;
            };
            let mut stack: Vec<ElemId> = body.clone();
            while let Some(id) = stack.pop() {
                match &self.arena.elements[id] {
                    LayoutElement::Call { index, .. } => calls.push((id, pos, *index)),
                    LayoutElement::Replication { body, .. } => stack.extend(body),
                    LayoutElement::Union { cases, default_body, .. } => {
                        for case in cases {
                            stack.extend(&case.body);
                        }
                        stack.extend(default_body);
                    }
                    _ => {}
                }
            }
        }
        for (call, enclosing, index) in calls {
            let target_pos = enclosing as i64 + i64::from(index);
            if target_pos < 0 || target_pos as usize >= callables.len() {
                self.pos = 0;
                return Err(self.fail(&format!("call ({index}) resolves outside the layout")));
            }
            let target = callables[target_pos as usize];
            if let LayoutElement::Call { target: t, .. } = &mut self.arena.elements[call] {
                *t = target;
            }
            if index < 0
                && let LayoutElement::Callable { backwards, .. } =
                    &mut self.arena.elements[target]
            {
                *backwards = true;
            }
        }
        let mut next = 0;
        for &callable in &callables {
            if let LayoutElement::Callable { backwards: true, backwards_index, .. } =
                &mut self.arena.elements[callable]
            {
                *backwards_index = Some(next);
                next += 1;
            }
        }
        Ok(())
    }
}

const fn size_char(u: UintType) -> char {
    match u {
        UintType::B => 'B',
        UintType::H => 'H',
        UintType::I => 'I',
        UintType::V => 'V',
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_line_number_table_layout() {
        let arena = parse_layout("NH[PHH]").expect("parse");
        assert_eq!(arena.top.len(), 1);
        assert_eq!(arena.band_count, 3); // count, bci, line
        let LayoutElement::Replication { tag, body, .. } = &arena.elements[arena.top[0]]
        else {
            panic!("expected replication");
        };
        assert_eq!(tag, "NH");
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn test_parse_local_variable_table_layout() {
        let arena = parse_layout("NH[PHOHRUHRSHH]").expect("parse");
        assert_eq!(arena.band_count, 6); // count + bci + span + name + sig + slot
    }

    #[test]
    fn test_parse_references() {
        let arena = parse_layout("RUNHRCHKQH").expect("parse");
        assert_eq!(arena.band_count, 3);
        let LayoutElement::Reference { kind, nullable, .. } = &arena.elements[arena.top[0]]
        else {
            panic!("expected reference");
        };
        assert_eq!(*kind, RefKind::RUtf8);
        assert!(nullable);
    }

    #[test]
    fn test_parse_union_with_default() {
        let arena = parse_layout("TB(1)[H](2,3)[I]()[]").expect("parse");
        let LayoutElement::Union { cases, default_body, .. } =
            &arena.elements[*arena.top.first().expect("top element")]
        else {
            panic!("expected union");
        };
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[1].values, vec![2, 3]);
        assert!(default_body.is_empty());
    }

    #[test]
    fn test_callables_and_backwards_calls() {
        // Two callables; the second calls the first backwards.
        let arena = parse_layout("[NH[(0)]][(-1)]").expect("parse");
        assert_eq!(arena.callables.len(), 2);
        assert_eq!(arena.backwards_callable_count(), 1);
        let LayoutElement::Callable { backwards, backwards_index, .. } =
            &arena.elements[arena.callables[0]]
        else {
            panic!("expected callable");
        };
        assert!(*backwards);
        assert_eq!(*backwards_index, Some(0));
        // the self-call in the first callable resolves to itself
        let LayoutElement::Callable { body, .. } = &arena.elements[arena.callables[0]] else {
            panic!("expected callable");
        };
        let LayoutElement::Replication { body: rep_body, .. } = &arena.elements[body[0]] else {
            panic!("expected replication");
        };
        let LayoutElement::Call { target, index } = &arena.elements[rep_body[0]] else {
            panic!("expected call");
        };
        assert_eq!(*index, 0);
        assert_eq!(*target, arena.callables[0]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_layout("X").is_err());
        assert!(parse_layout("N[H]").is_err()); // replication without size
        assert!(parse_layout("TB(1)[H]").is_err()); // union without default
        assert!(parse_layout("NH[PH").is_err()); // unbalanced bracket
        assert!(parse_layout("[(5)]").is_err()); // call beyond the callables
    }

    #[test]
    fn test_signed_and_offset_tags() {
        let arena = parse_layout("SBPOHOSH").expect("parse");
        let kinds: Vec<IntegralKind> = arena
            .top
            .iter()
            .map(|&id| match &arena.elements[id] {
                LayoutElement::Integral { kind, .. } => *kind,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![IntegralKind::Signed, IntegralKind::BciOffset, IntegralKind::SignedOffset]
        );
    }
}
