//! End to end checks across the parser, printer, encoder and decoder.
use pretty_assertions::assert_eq;

use crate::lib::ast;
use crate::lib::ast::Instruction;
use crate::lib::ast::Opcode;
use crate::lib::classfile;
use crate::lib::classfile::cpool::Const as RawConst;
use crate::lib::decode_class;
use crate::lib::disassemble;
use crate::lib::encode;
use crate::lib::parse;

fn op(name: &str) -> Opcode {
    Opcode::from_name(name).unwrap()
}

fn parse_one(source: &str) -> ast::Class {
    let mut classes = parse(source).unwrap();
    assert_eq!(classes.len(), 1);
    classes.remove(0)
}

/// Bytes of the Code attribute body of the given method.
fn code_bytes<'a>(raw: &classfile::parse::Class<'a>, method: usize) -> &'a [u8] {
    let attr = raw.methods[method]
        .attrs
        .iter()
        .find(|a| a.name_utf.0 == b"Code")
        .unwrap();
    let len = u32::from_be_bytes(attr.data[4..8].try_into().unwrap()) as usize;
    &attr.data[8..8 + len]
}

fn static_method(flags: ast::MethodAccessFlags, name: &str, desc: &str, code: ast::Code) -> ast::ClassItem {
    ast::ClassItem::Method(ast::Method {
        flags,
        name: name.into(),
        desc: desc.into(),
        attrs: vec![ast::Attribute::Code(code)],
    })
}

#[test]
fn test_encode_then_decode_add() {
    let items = ["iload_0", "iload_1", "iadd", "ireturn"]
        .iter()
        .enumerate()
        .map(|(i, name)| ast::CodeItem::labeled(ast::Label::at(i as u32), Instruction::Simple(op(name))))
        .collect();
    let class = ast::Class {
        version: Some(ast::Version { major: 52, minor: 0 }),
        flags: ast::ClassAccessFlags::PUBLIC | ast::ClassAccessFlags::SUPER,
        name: "Adder".into(),
        super_name: Some("java/lang/Object".into()),
        interfaces: vec![],
        items: vec![static_method(
            ast::MethodAccessFlags::PUBLIC | ast::MethodAccessFlags::STATIC,
            "add",
            "(II)I",
            ast::Code {
                stack: 2,
                locals: 2,
                items,
                exceptions: vec![],
                attrs: vec![],
            },
        )],
        bootstrap_methods: vec![],
    };

    let bytes = encode(&class).unwrap();
    assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);

    let decoded = decode_class(&bytes).unwrap();
    assert!(decoded.warnings.is_empty());
    let method = decoded.class.methods().next().unwrap();
    assert_eq!((method.name.as_str(), method.desc.as_str()), ("add", "(II)I"));
    let instrs: Vec<_> = method.code().unwrap().instructions().cloned().collect();
    assert_eq!(
        instrs,
        vec![
            Instruction::Simple(op("iload_0")),
            Instruction::Simple(op("iload_1")),
            Instruction::Simple(op("iadd")),
            Instruction::Simple(op("ireturn")),
        ]
    );
}

#[test]
fn test_parse_tableswitch() {
    let class = parse_one(
        "
.class Switch
.super java/lang/Object
.method static pick : (I)I
    .code stack 1 locals 1
L0:     iload_0
        tableswitch 0
            L1
            L2
            L3
            default : L4
L1:     iconst_1
        ireturn
L2:     iconst_2
        ireturn
L3:     iconst_3
        ireturn
L4:     iconst_0
        ireturn
    .end code
.end method
.end class
",
    );
    let code = class.methods().next().and_then(|m| m.code()).unwrap();
    let switch = code.instructions().nth(1).unwrap();
    assert_eq!(
        switch,
        &Instruction::TableSwitch {
            low: 0,
            targets: vec![ast::Label::from("L1"), ast::Label::from("L2"), ast::Label::from("L3")],
            default: ast::Label::from("L4"),
        }
    );
}

const CONCAT: &str = r#"
.version 52 0
.class public super Concat
.super java/lang/Object

.method public static join : (Ljava/lang/String;Ljava/lang/String;)Ljava/lang/String;
    .code stack 2 locals 2
L0:     aload_0
L1:     aload_1
L2:     invokedynamic InvokeDynamic invokeStatic Method java/lang/invoke/StringConcatFactory makeConcatWithConstants (Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/invoke/CallSite; String "\u0001, \u0001" : makeConcatWithConstants (Ljava/lang/String;Ljava/lang/String;)Ljava/lang/String;
L7:     areturn
    .end code
.end method
.end class
"#;

#[test]
fn test_string_concat_bootstrap() {
    let class = parse_one(CONCAT);
    assert_eq!(class.bootstrap_methods.len(), 1);
    let bsm = &class.bootstrap_methods[0];
    assert_eq!(bsm.handle.kind, ast::HandleKind::InvokeStatic);
    assert_eq!(bsm.args, vec![ast::Const::Str("\u{1}, \u{1}".into())]);

    let bytes = encode(&class).unwrap();
    let raw = classfile::parse(&bytes).unwrap();
    let bsms = raw
        .attrs
        .iter()
        .find_map(|a| match &a.body {
            classfile::attrs::AttrBody::BootstrapMethods(bsms) => Some(bsms),
            _ => None,
        })
        .unwrap();
    assert_eq!(bsms.len(), 1);
    let member = match raw.cp.0[bsms[0].bsref as usize] {
        RawConst::MethodHandle(kind, member) => {
            assert_eq!(kind, ast::HandleKind::InvokeStatic as u8);
            member
        }
        ref other => panic!("bootstrap method is {:?}", other),
    };
    assert!(matches!(raw.cp.0[member as usize], RawConst::Method(..)));

    // The call site refers to bootstrap 0
    let code = code_bytes(&raw, 0);
    assert_eq!(code[2], crate::lib::opcodes::INVOKEDYNAMIC);
    let cs = u16::from_be_bytes([code[3], code[4]]) as usize;
    assert!(matches!(raw.cp.0[cs], RawConst::InvokeDynamic(0, _)));
    assert_eq!(&code[5..7], &[0, 0]);
}

#[test]
fn test_double_nan_payload_survives_text() {
    let source = "
.class Nan
.super java/lang/Object
.field static final N D = +NaN<0x7FF0000000000123>
.field static final F F = -NaN<0x7FC00001>f
.end class
";
    let class = parse_one(source);
    let constants: Vec<_> = class.fields().map(|f| f.constant.clone()).collect();
    assert_eq!(
        constants,
        vec![Some(ast::Const::Double(0x7FF0000000000123)), Some(ast::Const::Float(0x7FC00001))]
    );

    let text = disassemble(&class);
    assert!(text.contains("+NaN<0x7FF0000000000123>"));
    assert_eq!(parse_one(&text), class);

    let decoded = decode_class(&encode(&class).unwrap()).unwrap().class;
    let n = decoded.fields().next().unwrap();
    assert_eq!(n.constant, Some(ast::Const::Double(0x7FF0000000000123)));
}

const DEMO: &str = r#"
.version 52 0
.class public super Demo
.super java/lang/Object
.implements java/lang/Runnable
.field private static final LIMIT I = 42
.field private static final BIG J = 123456789012L
.field private name Ljava/lang/String;

.method public <init> : ()V
    .code stack 1 locals 1
L0:     aload_0
L1:     invokespecial Method java/lang/Object <init> ()V
L4:     return
    .end code
.end method

.method public run : ()V
    .exceptions java/lang/IllegalStateException
    .code stack 2 locals 2
Lstart: aload_0
        ldc "running"
        putfield Field Demo name Ljava/lang/String;
Lend:   return
        .stack stack_1 Object java/lang/Throwable
Lcatch: astore_1
        aload_1
        athrow
        .catch java/lang/Throwable from Lstart to Lend using Lcatch
        .linenumbertable
            Lstart 10
            Lend 11
        .end linenumbertable
    .end code
.end method

.method public static count : (I)I
    .code stack 2 locals 300
        iconst_0
        istore_1
        .stack append Integer
Lloop:  iload_1
        iload_0
        if_icmpge Ldone
        iinc 1 1
        wide iinc 299 1000
        goto Lloop
        .stack same
Ldone:  iload_1
        lookupswitch
            7 : Lseven
            -5 : Ldone
            default : Lout
Lseven: sipush 1000
        newarray int
        arraylength
        ireturn
Lout:   ldc2_w 5L
        l2i
        ireturn
    .end code
.end method

.method public static make : ()[[I
    .code stack 2 locals 0
        iconst_2
        iconst_3
        multianewarray [[I 2
        areturn
    .end code
.end method
.sourcefile "Demo.java"
.end class
"#;

#[test]
fn test_binary_round_trip() {
    let bytes = encode(&parse_one(DEMO)).unwrap();
    let decoded = decode_class(&bytes).unwrap();
    assert!(decoded.warnings.is_empty(), "{:?}", decoded.warnings);
    let class = decoded.class;
    assert_eq!(class.interfaces, vec!["java/lang/Runnable".to_owned()]);
    assert_eq!(class.fields().count(), 3);
    assert_eq!(class.methods().count(), 4);

    let again = decode_class(&encode(&class).unwrap()).unwrap().class;
    assert_eq!(again, class);
}

#[test]
fn test_text_round_trip() {
    let class = decode_class(&encode(&parse_one(DEMO)).unwrap()).unwrap().class;
    let text = disassemble(&class);
    let reparsed = parse_one(&text);
    assert_eq!(reparsed, class);
    assert_eq!(disassemble(&reparsed), text);

    let class = decode_class(&encode(&parse_one(CONCAT)).unwrap()).unwrap().class;
    let text = disassemble(&class);
    assert_eq!(parse_one(&text), class);
    assert_eq!(disassemble(&parse_one(&text)), text);
}

fn single_method(body: &str) -> String {
    format!(
        ".class T\n.super java/lang/Object\n.method static m : ()V\n    .code stack 4 locals 4\n{}    .end code\n.end method\n.end class\n",
        body
    )
}

#[test]
fn test_string_constants_are_shared() {
    let class = parse_one(&single_method("L0: ldc \"same\"\nL2: ldc \"same\"\nL4: return\n"));
    let bytes = encode(&class).unwrap();
    let raw = classfile::parse(&bytes).unwrap();
    let strings = raw.cp.0.iter().filter(|c| matches!(c, RawConst::Str(_))).count();
    assert_eq!(strings, 1);

    let code = code_bytes(&raw, 0);
    assert_eq!(code[0], crate::lib::opcodes::LDC);
    assert_eq!(code[2], crate::lib::opcodes::LDC);
    assert_eq!(code[1], code[3]);
}

#[test]
fn test_long_takes_two_slots() {
    let class = parse_one(&single_method("L0: ldc2_w 5L\nL3: ldc \"x\"\nL5: return\n"));
    let bytes = encode(&class).unwrap();
    let raw = classfile::parse(&bytes).unwrap();
    let code = code_bytes(&raw, 0);
    assert_eq!(&code[..3], &[crate::lib::opcodes::LDC2_W, 0, 1]);
    assert!(matches!(raw.cp.0[1], RawConst::Long(5)));
    assert!(matches!(raw.cp.0[2], RawConst::Null));
    assert!(matches!(raw.cp.0[3], RawConst::Utf8(_)));
    assert!(matches!(raw.cp.0[4], RawConst::Str(3)));
    assert_eq!(code[4], 4);
}

#[test]
fn test_branch_offsets() {
    let class = parse_one(&single_method(
        "L0: iconst_0\nL1: ifeq L7\nL4: goto L0\nL7: return\n",
    ));
    let bytes = encode(&class).unwrap();
    let raw = classfile::parse(&bytes).unwrap();
    let code = code_bytes(&raw, 0);
    assert_eq!(code, &[0x03, 0x99, 0x00, 0x06, 0xA7, 0xFF, 0xFC, 0xB1]);
}

#[test]
fn test_switch_padding() {
    for nops in 0..4 {
        let body = format!(
            "{}        tableswitch 0\n            Lend\n            default : Lend\nLend:   return\n",
            "        nop\n".repeat(nops)
        );
        let bytes = encode(&parse_one(&single_method(&body))).unwrap();
        let raw = classfile::parse(&bytes).unwrap();
        let code = code_bytes(&raw, 0);

        let k = nops;
        assert_eq!(code[k], crate::lib::opcodes::TABLESWITCH);
        let payload = (k + 4) / 4 * 4;
        assert!(code[k + 1..payload].iter().all(|&b| b == 0));
        // default, low, high, one target
        let end = payload + 16;
        let delta = (end - k) as i32;
        let word = |i: usize| i32::from_be_bytes(code[i..i + 4].try_into().unwrap());
        assert_eq!((word(payload), word(payload + 4), word(payload + 8)), (delta, 0, 0));
        assert_eq!(word(payload + 12), delta);
        assert_eq!(code[end], 0xB1);
        assert_eq!(code.len(), end + 1);
    }
}
