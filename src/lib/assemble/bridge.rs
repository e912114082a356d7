//! Lowers a parse tree into the canonical AST.
//!
//! Inline bootstrap definitions are numbered in order of appearance and
//! then assigned table indices in reverse, so the `.bootstrap` definitions the
//! printer writes from the highest index down come back with their original
//! indices. Anonymous sites that resolve to the same handle and arguments
//! share one table entry. Named `.bootstrap` definitions always get their own.
use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;

use super::span::Location;
use super::span::Span;
use super::span::SpanBounds;
use super::tree;
use super::tree::BsExpr;
use super::tree::ConstExpr;
use super::span::Spanned;
use super::tree::InlineConst;
use super::tree::Instr;
use crate::lib::ast;
use crate::lib::ast::Const;

/// A parse tree that is well formed but cannot be lowered, such as a
/// reference to an undefined constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeError {
    pub msg: String,
    pub location: Location,
}
impl BridgeError {
    fn new(source: &str, msg: impl Into<String>, span: Span<'_>) -> Self {
        Self {
            msg: msg.into(),
            location: Location::new(source, SpanBounds::new(span, source)),
        }
    }

    pub fn line(&self) -> usize {
        self.location.line
    }

    pub fn col(&self) -> usize {
        self.location.col
    }
}
impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}: {}\n{}", self.location.line, self.location.col, self.msg, self.location.snippet())
    }
}
impl std::error::Error for BridgeError {}

type Result<T> = std::result::Result<T, BridgeError>;

fn is_numeric_ref(span: Span<'_>) -> bool {
    let inner = span.0.trim_start_matches('[').trim_end_matches(']');
    let inner = inner.strip_prefix("bs:").unwrap_or(inner);
    !inner.is_empty() && inner.bytes().all(|b| b.is_ascii_digit())
}

struct Bridge<'a, 's> {
    source: &'s str,
    consts: HashMap<&'a str, &'s ConstExpr<'a>>,
    bootstraps: HashMap<&'a str, &'s BsExpr<'a>>,
    /// Inline bootstrap definitions, indexed by their id
    sites: Vec<&'s Spanned<'a, tree::BsInline<'a>>>,
    /// Ids of sites that are the right hand side of a `.bootstrap` definition
    named: HashSet<usize>,
    /// Representative site id of each site's merge group
    groups: Vec<Option<usize>>,
    grouping: HashSet<usize>,
    merged: HashMap<ast::BootstrapMethod, usize>,
    /// Final table index of each site, once grouping is finished
    indices: Option<Vec<u16>>,
    /// Constant definitions currently being expanded
    resolving: HashSet<&'a str>,
}
impl<'a, 's> Bridge<'a, 's> {
    fn error<T>(&self, msg: impl Into<String>, span: Span<'_>) -> Result<T> {
        Err(BridgeError::new(self.source, msg, span))
    }

    fn check_ref(&self, span: Span<'a>) -> Result<()> {
        if is_numeric_ref(span) {
            self.error(
                "Raw constant pool indices are not supported; use a symbolic reference like [_1]",
                span,
            )
        } else {
            Ok(())
        }
    }

    fn collect_const(&mut self, c: &'s ConstExpr<'a>) {
        if let ConstExpr::Inline(c) = c {
            match &c.v {
                InlineConst::Value(_) => {}
                InlineConst::MethodHandle(_, body) => self.collect_const(body),
                InlineConst::Dynamic(bs, _) | InlineConst::InvokeDynamic(bs, _) => self.collect_bs(bs),
            }
        }
    }

    fn collect_bs(&mut self, bs: &'s BsExpr<'a>) {
        if let BsExpr::Inline(bs) = bs {
            self.sites.push(bs);
            self.collect_const(&bs.v.handle);
            for arg in &bs.v.args {
                self.collect_const(arg);
            }
        }
    }

    fn collect_attr(&mut self, attr: &'s tree::Attribute<'a>) {
        if let tree::Attribute::Code(code) = attr {
            for item in &code.items {
                match item.instr.as_ref().map(|i| &i.v) {
                    Some(Instr::Ldc(_, c)) | Some(Instr::InvokeDynamic(c)) => self.collect_const(c),
                    _ => {}
                }
            }
        }
    }

    fn collect(&mut self, class: &'s tree::Class<'a>) -> Result<()> {
        for item in &class.items {
            match item {
                tree::Item::Const { lhs, rhs } => {
                    self.check_ref(*lhs)?;
                    if self.consts.insert(lhs.0, rhs).is_some() {
                        return self.error("Duplicate constant definition", *lhs);
                    }
                    self.collect_const(rhs);
                }
                tree::Item::Bootstrap { lhs, rhs } => {
                    self.check_ref(*lhs)?;
                    if self.bootstraps.insert(lhs.0, rhs).is_some() {
                        return self.error("Duplicate bootstrap definition", *lhs);
                    }
                    if let BsExpr::Inline(bs) = rhs {
                        self.named.insert(bs.v.id);
                    }
                    self.collect_bs(rhs);
                }
                tree::Item::Field(f) => {
                    if let Some(c) = &f.constant {
                        self.collect_const(c);
                    }
                    f.attrs.iter().for_each(|a| self.collect_attr(a));
                }
                tree::Item::Method(m) => m.attrs.iter().for_each(|a| self.collect_attr(a)),
                tree::Item::Attribute(a) => self.collect_attr(a),
            }
        }

        self.sites.sort_by_key(|bs| bs.v.id);
        if self.sites.len() > u16::MAX as usize {
            return self.error("Maximum number of bootstrap methods (65535) exceeded", class.span);
        }
        self.groups = vec![None; self.sites.len()];
        Ok(())
    }

    ///////////////////////////////////////////////////////////////////////////
    /// Until final indices are known, sites resolve to their group's
    /// representative id, which is enough to compare two sites structurally.
    fn bs_index(&mut self, id: usize) -> Result<u16> {
        if let Some(indices) = &self.indices {
            return Ok(indices[id]);
        }
        self.group(id).map(|rep| rep as u16)
    }

    fn group(&mut self, id: usize) -> Result<usize> {
        if let Some(rep) = self.groups[id] {
            return Ok(rep);
        }
        let rep = if self.named.contains(&id) {
            id
        } else {
            let site = self.sites[id];
            if !self.grouping.insert(id) {
                return self.error("Circular bootstrap definition", site.span);
            }
            let key = self.bootstrap_method(site)?;
            self.grouping.remove(&id);
            *self.merged.entry(key).or_insert(id)
        };
        self.groups[id] = Some(rep);
        Ok(rep)
    }

    fn resolve_bs(&mut self, bs: &'s BsExpr<'a>) -> Result<u16> {
        let mut cur = bs;
        let mut seen = HashSet::new();
        loop {
            match cur {
                BsExpr::Inline(bs) => return self.bs_index(bs.v.id),
                BsExpr::Ref(span) => {
                    self.check_ref(*span)?;
                    if !seen.insert(span.0) {
                        return self.error("Circular bootstrap definition", *span);
                    }
                    cur = match self.bootstraps.get(span.0) {
                        Some(def) => *def,
                        None => return self.error("Undefined bootstrap reference", *span),
                    };
                }
            }
        }
    }

    fn resolve_const(&mut self, c: &'s ConstExpr<'a>) -> Result<Const> {
        match c {
            ConstExpr::Ref(span) => {
                self.check_ref(*span)?;
                let def = match self.consts.get(span.0) {
                    Some(def) => *def,
                    None => return self.error("Undefined constant reference", *span),
                };
                if !self.resolving.insert(span.0) {
                    return self.error("Circular constant definition", *span);
                }
                let res = self.resolve_const(def);
                self.resolving.remove(span.0);
                res
            }
            ConstExpr::Inline(c) => Ok(match &c.v {
                InlineConst::Value(v) => v.clone(),
                InlineConst::MethodHandle(kind, body) => match self.resolve_const(body)? {
                    Const::Ref(ref_kind, member) => Const::MethodHandle(ast::MethodHandle {
                        kind: *kind,
                        ref_kind,
                        member,
                    }),
                    _ => return self.error("Method handle must refer to a Field, Method or InterfaceMethod", c.span),
                },
                InlineConst::Dynamic(bs, nat) => Const::Dynamic(self.resolve_bs(bs)?, nat.clone()),
                InlineConst::InvokeDynamic(bs, nat) => Const::InvokeDynamic(self.resolve_bs(bs)?, nat.clone()),
            }),
        }
    }

    fn const_span(c: &ConstExpr<'a>) -> Span<'a> {
        match c {
            ConstExpr::Ref(span) => *span,
            ConstExpr::Inline(c) => c.span,
        }
    }

    fn bootstrap_method(&mut self, bs: &'s Spanned<'a, tree::BsInline<'a>>) -> Result<ast::BootstrapMethod> {
        let handle = match self.resolve_const(&bs.v.handle)? {
            Const::MethodHandle(mh) => mh,
            _ => return self.error("Bootstrap method must be a MethodHandle", Self::const_span(&bs.v.handle)),
        };
        let args = bs.v.args.iter().map(|arg| self.resolve_const(arg)).collect::<Result<_>>()?;
        Ok(ast::BootstrapMethod { handle, args })
    }

    /// Walks sites from last to first; the first site of each group to be
    /// seen takes the next table index.
    fn bootstrap_methods(&mut self) -> Result<Vec<ast::BootstrapMethod>> {
        let mut indices = vec![0; self.sites.len()];
        let mut rep_index = HashMap::new();
        let mut order = Vec::new();
        for id in (0..self.sites.len()).rev() {
            let rep = self.group(id)?;
            indices[id] = *rep_index.entry(rep).or_insert_with(|| {
                order.push(rep);
                (order.len() - 1) as u16
            });
        }
        self.indices = Some(indices);

        let mut table = Vec::with_capacity(order.len());
        for rep in order {
            let site = self.sites[rep];
            table.push(self.bootstrap_method(site)?);
        }
        Ok(table)
    }

    ///////////////////////////////////////////////////////////////////////////
    fn code(&mut self, code: &'s tree::Code<'a>) -> Result<ast::Code> {
        let mut items = Vec::with_capacity(code.items.len());
        for item in &code.items {
            let instr = match &item.instr {
                None => None,
                Some(instr) => Some(match &instr.v {
                    Instr::Plain(ins) => ins.clone(),
                    Instr::Ldc(op, c) => ast::Instruction::Ldc(*op, self.resolve_const(c)?),
                    Instr::InvokeDynamic(c) => match self.resolve_const(c)? {
                        Const::InvokeDynamic(bootstrap, nat) => ast::Instruction::InvokeDynamic { bootstrap, nat },
                        _ => return self.error("invokedynamic requires an InvokeDynamic constant", instr.span),
                    },
                }),
            };
            items.push(ast::CodeItem {
                label: item.label.clone(),
                instr,
            });
        }

        Ok(ast::Code {
            stack: code.stack,
            locals: code.locals,
            items,
            exceptions: code.exceptions.clone(),
            attrs: code.attrs.clone(),
        })
    }

    fn attr(&mut self, attr: &'s tree::Attribute<'a>) -> Result<ast::Attribute> {
        Ok(match attr {
            tree::Attribute::Code(code) => ast::Attribute::Code(self.code(code)?),
            tree::Attribute::Other(a) => a.clone(),
        })
    }

    fn attrs(&mut self, attrs: &'s [tree::Attribute<'a>]) -> Result<Vec<ast::Attribute>> {
        attrs.iter().map(|a| self.attr(a)).collect()
    }

    fn class(&mut self, class: &'s tree::Class<'a>) -> Result<ast::Class> {
        self.collect(class)?;
        let bootstrap_methods = self.bootstrap_methods()?;

        let mut items = Vec::with_capacity(class.items.len());
        for item in &class.items {
            let item = match item {
                tree::Item::Field(f) => ast::ClassItem::Field(ast::Field {
                    flags: f.flags,
                    name: f.name.clone(),
                    desc: f.desc.clone(),
                    constant: f.constant.as_ref().map(|c| self.resolve_const(c)).transpose()?,
                    attrs: self.attrs(&f.attrs)?,
                }),
                tree::Item::Method(m) => ast::ClassItem::Method(ast::Method {
                    flags: m.flags,
                    name: m.name.clone(),
                    desc: m.desc.clone(),
                    attrs: self.attrs(&m.attrs)?,
                }),
                tree::Item::Attribute(a) => ast::ClassItem::Attribute(self.attr(a)?),
                // Definitions leave no trace in the AST, but must still resolve
                tree::Item::Const { rhs, .. } => {
                    self.resolve_const(rhs)?;
                    continue;
                }
                tree::Item::Bootstrap { rhs, .. } => {
                    self.resolve_bs(rhs)?;
                    continue;
                }
            };
            items.push(item);
        }

        Ok(ast::Class {
            version: class.version,
            flags: class.flags,
            name: class.name.clone(),
            super_name: class.super_name.clone(),
            interfaces: class.interfaces.clone(),
            items,
            bootstrap_methods,
        })
    }
}

/// Lower one parsed class. `source` is the text the tree was parsed from and
/// is only used to locate errors.
pub fn bridge(source: &str, class: &tree::Class) -> Result<ast::Class> {
    let mut b = Bridge {
        source,
        consts: HashMap::new(),
        bootstraps: HashMap::new(),
        sites: Vec::new(),
        named: HashSet::new(),
        groups: Vec::new(),
        grouping: HashSet::new(),
        merged: HashMap::new(),
        resolving: HashSet::new(),
        indices: None,
    };
    let res = b.class(class)?;
    log::debug!(
        "bridged class {} with {} bootstrap methods",
        res.name,
        res.bootstrap_methods.len()
    );
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lib::assemble::base_parser::BaseParser;
    use crate::lib::assemble::class_parser::ClassParser;
    use crate::lib::assemble::tokenize::tokenize;

    fn lower(source: &str) -> Result<ast::Class> {
        let p = ClassParser::new(BaseParser::new(source, tokenize(source).unwrap()));
        let (_, class) = p.parse().unwrap();
        bridge(source, &class)
    }

    fn with_method(body: &str, defs: &str) -> String {
        format!(
            ".class public Foo\n.super java/lang/Object\n\n.method static run : ()V\n    .code stack 1 locals 0\n{}    .end code\n.end method\n{}.end class\n",
            body, defs
        )
    }

    fn first_code(class: &ast::Class) -> &ast::Code {
        class.methods().next().and_then(|m| m.code()).unwrap()
    }

    #[test]
    fn test_const_refs_resolve_in_any_order() {
        let source = with_method(
            "L0:     ldc [_1]\nL2:     return\n",
            ".const [_1] = [_2]\n.const [_2] = String \"hi\"\n",
        );
        let class = lower(&source).unwrap();
        let code = first_code(&class);
        assert_eq!(
            code.items[0].instr,
            Some(ast::Instruction::Ldc(ast::Opcode::from_name("ldc").unwrap(), Const::Str("hi".into())))
        );
        assert!(class.bootstrap_methods.is_empty());
    }

    #[test]
    fn test_bootstrap_indices_are_reversed() {
        let source = with_method(
            "L0:     invokedynamic InvokeDynamic invokeStatic Method A first ()V : a ()V\n\
L5:     invokedynamic InvokeDynamic invokeStatic Method A second ()V Int 7 : b ()V\n\
L10:    return\n",
            "",
        );
        let class = lower(&source).unwrap();
        let code = first_code(&class);
        let indices: Vec<_> = code
            .instructions()
            .filter_map(|ins| match ins {
                ast::Instruction::InvokeDynamic { bootstrap, .. } => Some(*bootstrap),
                _ => None,
            })
            .collect();
        assert_eq!(indices, vec![1, 0]);
        assert_eq!(class.bootstrap_methods[0].handle.member.nat.name, "second");
        assert_eq!(class.bootstrap_methods[0].args, vec![Const::Int(7)]);
        assert_eq!(class.bootstrap_methods[1].handle.member.nat.name, "first");
    }

    fn bootstrap_indices(code: &ast::Code) -> Vec<u16> {
        code.instructions()
            .filter_map(|ins| match ins {
                ast::Instruction::InvokeDynamic { bootstrap, .. } => Some(*bootstrap),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_identical_bootstraps_are_merged() {
        let source = with_method(
            "L0:     invokedynamic [_1]\nL5:     invokedynamic [_2]\n\
L10:    invokedynamic InvokeDynamic invokeStatic Method A c ()V : y ()V\nL15:    return\n",
            ".const [_1] = InvokeDynamic invokeStatic Method A b ()V : x ()V\n\
.const [_2] = InvokeDynamic invokeStatic Method A b ()V : x ()V\n",
        );
        let class = lower(&source).unwrap();
        assert_eq!(class.bootstrap_methods.len(), 2);
        assert_eq!(class.bootstrap_methods[0].handle.member.nat.name, "c");
        assert_eq!(class.bootstrap_methods[1].handle.member.nat.name, "b");
        assert_eq!(bootstrap_indices(first_code(&class)), vec![1, 1, 0]);
    }

    #[test]
    fn test_merge_sees_through_nested_bootstraps() {
        let source = with_method(
            "L0:     invokedynamic [_1]\nL5:     invokedynamic [_2]\nL10:    return\n",
            ".const [_1] = InvokeDynamic invokeStatic Method A b ()V Dynamic invokeStatic Method A d ()V : k I : x ()V\n\
.const [_2] = InvokeDynamic invokeStatic Method A b ()V Dynamic invokeStatic Method A d ()V : k I : x ()V\n",
        );
        let class = lower(&source).unwrap();
        assert_eq!(class.bootstrap_methods.len(), 2);
        assert_eq!(class.bootstrap_methods[1].handle.member.nat.name, "b");
        match &class.bootstrap_methods[1].args[..] {
            [Const::Dynamic(0, _)] => {}
            args => panic!("unexpected args {:?}", args),
        }
        assert_eq!(bootstrap_indices(first_code(&class)), vec![1, 1]);
    }

    #[test]
    fn test_named_bootstraps_are_kept() {
        let source = with_method(
            "L0:     invokedynamic InvokeDynamic [bs:_0] x ()V\n\
L5:     invokedynamic InvokeDynamic [bs:_1] x ()V\nL10:    return\n",
            ".bootstrap [bs:_1] = Bootstrap invokeStatic Method A b ()V :\n\
.bootstrap [bs:_0] = Bootstrap invokeStatic Method A b ()V :\n",
        );
        let class = lower(&source).unwrap();
        assert_eq!(class.bootstrap_methods.len(), 2);
        assert_eq!(class.bootstrap_methods[0], class.bootstrap_methods[1]);
        assert_eq!(bootstrap_indices(first_code(&class)), vec![0, 1]);
    }

    #[test]
    fn test_reference_errors() {
        let err = lower(&with_method("L0:     ldc [_9]\n", "")).unwrap_err();
        assert_eq!(err.msg, "Undefined constant reference");
        assert_eq!(err.line(), 6);

        let err = lower(&with_method("", ".const [_1] = [_2]\n.const [_2] = [_1]\n")).unwrap_err();
        assert_eq!(err.msg, "Circular constant definition");

        let err = lower(&with_method("", ".const [_1] = Int 1\n.const [_1] = Int 2\n")).unwrap_err();
        assert_eq!(err.msg, "Duplicate constant definition");

        let err = lower(&with_method("L0:     ldc [3]\n", "")).unwrap_err();
        assert!(err.msg.starts_with("Raw constant pool indices are not supported"));

        let err = lower(&with_method("", ".const [_1] = InvokeDynamic [bs:_4] x ()V\n")).unwrap_err();
        assert_eq!(err.msg, "Undefined bootstrap reference");
    }

    #[test]
    fn test_bootstrap_handle_must_be_method_handle() {
        let source = with_method("", ".const [_1] = Int 3\n.bootstrap [bs:_0] = Bootstrap [_1] :\n");
        let err = lower(&source).unwrap_err();
        assert_eq!(err.msg, "Bootstrap method must be a MethodHandle");
        assert!(err.to_string().starts_with(&format!("{}:", err.line())));
    }
}
