use super::base_parser::BaseParser;
use super::class_parser::ClassParser;
use super::span::ParseError;
use super::tokenize::TokenType;
use super::tree;
use crate::lib::ast;

impl<'a> ClassParser<'a> {
    fn parse_const_def(&mut self) -> Result<tree::Item<'a>, ParseError> {
        self.val(".const")?;
        let lhs = self.assert_type(TokenType::Ref)?;
        self.val("=")?;
        let rhs = self.ref_or_tagged_const()?;
        self.eol()?;
        Ok(tree::Item::Const { lhs, rhs })
    }

    fn parse_bootstrap_def(&mut self) -> Result<tree::Item<'a>, ParseError> {
        self.val(".bootstrap")?;
        let lhs = self.assert_type(TokenType::BsRef)?;
        self.val("=")?;
        let rhs = self.ref_or_tagged_bootstrap()?;
        self.eol()?;
        Ok(tree::Item::Bootstrap { lhs, rhs })
    }
    ///////////////////////////////////////////////////////////////////////////

    fn parse_attr_list(&mut self, attrs: &mut Vec<tree::Attribute<'a>>) -> Result<(), ParseError> {
        while !self.tryv(".end") {
            if attrs.len() == u16::MAX as usize {
                let span = self.peek()?.1;
                return self.err1("Maximum number of attributes (65535) exceeded", span);
            }
            attrs.push(self.parse_attr()?);
            self.eol()?;
        }
        Ok(())
    }

    fn parse_field_def(&mut self) -> Result<tree::Field<'a>, ParseError> {
        self.val(".field")?;
        let flags = self.flags(ast::FieldAccessFlags::from_bits, "fields")?;
        let name = self.utf()?;
        let desc = self.utf()?;

        let constant = if self.tryv("=") { Some(self.ldc_rhs()?) } else { None };

        let mut attrs = Vec::new();
        if self.tryv(".fieldattributes") {
            self.eol()?;
            self.parse_attr_list(&mut attrs)?;
            self.val("fieldattributes")?;
        }
        self.eol()?;

        Ok(tree::Field {
            flags,
            name,
            desc,
            constant,
            attrs,
        })
    }

    fn parse_method_def(&mut self) -> Result<tree::Method<'a>, ParseError> {
        self.val(".method")?;
        let flags = self.flags(ast::MethodAccessFlags::from_bits, "methods")?;
        let name = self.utf()?;
        self.val(":")?;
        let desc = self.utf()?;
        self.eol()?;

        let mut attrs = Vec::new();
        self.parse_attr_list(&mut attrs)?;
        self.val("method")?;
        self.eol()?;

        Ok(tree::Method {
            flags,
            name,
            desc,
            attrs,
        })
    }

    ///////////////////////////////////////////////////////////////////////////

    /// Parses one class, through `.end class`, handing the token stream back
    /// for the next one.
    pub fn parse(mut self) -> Result<(BaseParser<'a>, tree::Class<'a>), ParseError> {
        let version = if self.tryv(".version") {
            let major = self.u16()?;
            let minor = self.u16()?;
            self.eol()?;
            Some(ast::Version { major, minor })
        } else {
            None
        };

        let span = self.peek()?.1;
        self.val(".class")?;
        let flags = self.flags(ast::ClassAccessFlags::from_bits, "classes")?;
        let name = self.utf()?;
        self.eol()?;

        let super_name = if self.tryv(".super") {
            let s = self.utf()?;
            self.eol()?;
            Some(s)
        } else {
            None
        };

        let mut interfaces = Vec::new();
        while let Some(span) = self.tryv2(".implements") {
            if interfaces.len() == u16::MAX as usize {
                return self.err1("Maximum number of interfaces (65535) exceeded", span);
            }
            interfaces.push(self.utf()?);
            self.eol()?;
        }

        let mut items = Vec::new();
        let mut field_count = 0;
        let mut method_count = 0;
        let mut attr_count = 0;
        loop {
            let tok = self.peek()?;
            let item = match tok.1 .0 {
                ".bootstrap" => self.parse_bootstrap_def()?,
                ".const" => self.parse_const_def()?,
                ".field" => {
                    if field_count == u16::MAX {
                        return self.err1("Maximum number of fields (65535) exceeded", tok.1);
                    }
                    field_count += 1;
                    tree::Item::Field(self.parse_field_def()?)
                }
                ".method" => {
                    if method_count == u16::MAX {
                        return self.err1("Maximum number of methods (65535) exceeded", tok.1);
                    }
                    method_count += 1;
                    tree::Item::Method(self.parse_method_def()?)
                }
                ".end" => {
                    self.val(".end")?;
                    self.val("class")?;
                    self.eol()?;
                    break;
                }
                _ => {
                    if tok.0 != TokenType::Directive {
                        return self.err1(
                            "Expected .field, .method, .const, .bootstrap, .end class, or attribute directive",
                            tok.1,
                        );
                    }
                    if attr_count == u16::MAX {
                        return self.err1("Maximum number of attributes (65535) exceeded", tok.1);
                    }
                    attr_count += 1;
                    let attr = self.parse_attr()?;
                    self.eol()?;
                    tree::Item::Attribute(attr)
                }
            };
            items.push(item);
        }

        log::trace!("parsed class {} with {} items", name, items.len());
        let class = tree::Class {
            span,
            version,
            flags,
            name,
            super_name,
            interfaces,
            items,
        };
        Ok((self.parser, class))
    }
}
