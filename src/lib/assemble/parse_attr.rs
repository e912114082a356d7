use super::class_parser::ClassParser;
use super::span::ParseError;
use super::span::Span;
use super::string;
use super::tokenize::TokenType;
use super::tree;
use crate::lib::ast;
use crate::lib::ast::ElementValue;

/// Directives other assemblers accept that are left to `.attribute` here
static UNSUPPORTED: &[&str] = &[
    ".bootstrapmethods",
    ".constantvalue",
    ".enclosing",
    ".methodparameters",
    ".module",
    ".modulemainclass",
    ".modulepackages",
    ".nesthost",
    ".nestmembers",
    ".permittedsubclasses",
    ".record",
    ".sourcedebugextension",
];

impl<'a> ClassParser<'a> {
    pub fn unsupported_directive<T>(&self, directive: Span<'a>) -> Result<T, ParseError> {
        if UNSUPPORTED.contains(&directive.0) {
            self.err1str(
                format!("Unsupported directive {}; write it as a raw .attribute instead", directive.0),
                directive,
            )
        } else {
            self.err1("Unrecognized attribute directive", directive)
        }
    }

    /// Elements up to a `.end <tag>` line.
    pub fn dotend_list<T>(
        &mut self,
        tag: &str,
        mut f: impl FnMut(&mut Self) -> Result<T, ParseError>,
    ) -> Result<Vec<T>, ParseError> {
        self.eol()?;
        let mut vals = Vec::new();
        while !self.tryv(".end") {
            if vals.len() == u16::MAX as usize {
                let span = self.peek()?.1;
                return self.err1("Maximum number of elements (65535) exceeded", span);
            }
            vals.push(f(self)?);
        }
        self.val(tag)?;
        Ok(vals)
    }

    /// Name and contents of a `.attribute` directive. Byte strings are taken
    /// as is, other strings are stored as modified UTF-8.
    pub fn raw_attr_body(&mut self) -> Result<ast::RawAttribute, ParseError> {
        let name = self.utf()?;
        let span = self.assert_type(TokenType::StringLit)?;
        let data = string::unescape_bytes(span.0).map_err(|(msg, s)| self.error1(msg, Span(s)))?;
        if data.len() > u32::MAX as usize {
            return self.err1("Exceeded maximum attribute length (2^32-1 bytes)", span);
        }
        Ok(ast::RawAttribute { name, data })
    }

    fn runtime_annotations(&mut self) -> Result<ast::Attribute, ParseError> {
        let tok = self.next()?;
        let visible = match tok.1 .0 {
            "visible" => true,
            "invisible" => false,
            _ => return self.err1("Expected visible or invisible", tok.1),
        };

        let tok = self.next()?;
        Ok(match tok.1 .0 {
            "annotations" => {
                let annotations = self.dotend_list("runtime", |p| {
                    p.val(".annotation")?;
                    let anno = p.annotation()?;
                    p.eol()?;
                    Ok(anno)
                })?;
                ast::Attribute::Annotations { visible, annotations }
            }
            "paramannotations" => {
                let params = self.dotend_list("runtime", |p| {
                    p.val(".paramannotation")?;
                    let annos = p.dotend_list("paramannotation", |p| {
                        p.val(".annotation")?;
                        let anno = p.annotation()?;
                        p.eol()?;
                        Ok(anno)
                    })?;
                    p.eol()?;
                    Ok(annos)
                })?;
                if params.len() > u8::MAX as usize {
                    return self.err1("Maximum number of parameters (255) exceeded", tok.1);
                }
                ast::Attribute::ParameterAnnotations { visible, params }
            }
            "typeannotations" => {
                return self.err1(
                    "Unsupported directive .runtime typeannotations; write it as a raw .attribute instead",
                    tok.1,
                )
            }
            _ => return self.err1("Expected annotations or paramannotations", tok.1),
        })
    }

    fn innerclass_line(&mut self) -> Result<ast::InnerClass, ParseError> {
        let inner = self.utf()?;
        let outer = self.opt_cls()?;
        let name = self.opt_cls()?;
        let flags = self.flags(ast::InnerClassAccessFlags::from_bits, "inner classes")?;
        self.eol()?;
        Ok(ast::InnerClass {
            inner,
            outer,
            name,
            flags,
        })
    }

    /// One attribute directive of a class, field or method.
    pub fn parse_attr(&mut self) -> Result<tree::Attribute<'a>, ParseError> {
        use ast::Attribute::*;
        let directive = self.next()?.1;

        let attr = match directive.0 {
            ".annotationdefault" => AnnotationDefault(self.element_value()?),
            ".code" => return Ok(tree::Attribute::Code(self.parse_code()?)),
            ".deprecated" => Deprecated,
            ".exceptions" => {
                let mut classes = Vec::new();
                while !self.has_type(TokenType::Newlines) {
                    if classes.len() == u16::MAX as usize {
                        let span = self.peek()?.1;
                        return self.err1("Maximum number of elements (65535) exceeded", span);
                    }
                    classes.push(self.utf()?);
                }
                Exceptions(classes)
            }
            ".innerclasses" => InnerClasses(self.dotend_list("innerclasses", Self::innerclass_line)?),
            ".runtime" => self.runtime_annotations()?,
            ".signature" => Signature(self.utf()?),
            ".sourcefile" => SourceFile(self.utf()?),
            ".synthetic" => Synthetic,
            ".attribute" => Raw(self.raw_attr_body()?),
            ".stackmaptable" | ".linenumbertable" | ".localvariabletable" | ".localvariabletypetable" => {
                return self.err1("Code attributes may only be used inside .code", directive)
            }
            _ => return self.unsupported_directive(directive),
        };
        Ok(tree::Attribute::Other(attr))
    }

    ///////////////////////////////////////////////////////////////////////////////
    fn annotation(&mut self) -> Result<ast::Annotation, ParseError> {
        let type_desc = self.utf()?;
        self.eol()?;
        let mut elements = Vec::new();
        while !self.tryv(".end") {
            if elements.len() == u16::MAX as usize {
                let span = self.peek()?.1;
                return self.err1("Maximum number of annotations elements (65535) exceeded", span);
            }
            let name = self.utf()?;
            self.val("=")?;
            let val = self.element_value()?;
            self.eol()?;
            elements.push((name, val));
        }
        self.val("annotation")?;
        Ok(ast::Annotation { type_desc, elements })
    }

    fn element_value(&mut self) -> Result<ElementValue, ParseError> {
        let tok = self.next()?;
        Ok(match tok.1 .0 {
            "annotation" => ElementValue::Annotation(self.annotation()?),
            "array" => {
                self.eol()?;
                let mut vals = Vec::new();
                while !self.tryv(".end") {
                    if vals.len() == u16::MAX as usize {
                        let span = self.peek()?.1;
                        return self.err1("Maximum number of annotations in array element (65535) exceeded", span);
                    }
                    vals.push(self.element_value()?);
                    self.eol()?;
                }
                self.val("array")?;
                ElementValue::Array(vals)
            }
            "boolean" => ElementValue::Boolean(self.i32()?),
            "byte" => ElementValue::Byte(self.i32()?),
            "char" => ElementValue::Char(self.i32()?),
            "short" => ElementValue::Short(self.i32()?),
            "int" => ElementValue::Int(self.i32()?),
            "long" => {
                let span = self.assert_type(TokenType::LongLit)?;
                match self.long_from(span)? {
                    ast::Const::Long(v) => ElementValue::Long(v),
                    _ => return self.err1("Invalid long literal", span),
                }
            }
            "float" => {
                let span = self.assert_type(TokenType::FloatLit)?;
                match self.float_from(span)? {
                    ast::Const::Float(v) => ElementValue::Float(v),
                    _ => return self.err1("Invalid float literal", span),
                }
            }
            "double" => {
                let span = self.assert_type(TokenType::DoubleLit)?;
                match self.double_from(span)? {
                    ast::Const::Double(v) => ElementValue::Double(v),
                    _ => return self.err1("Invalid double literal", span),
                }
            }
            "class" => ElementValue::Class(self.utf()?),
            "enum" => {
                let type_desc = self.utf()?;
                let name = self.utf()?;
                ElementValue::Enum { type_desc, name }
            }
            "string" => ElementValue::Str(self.utf()?),
            _ => return self.err1("Unrecognized element value tag", tok.1),
        })
    }
}
