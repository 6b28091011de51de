//! Parser for textual method listings.
//!
//! ```text
//! ; pool entries are shared by every method in the file
//! .const 1 int 42
//! .field 2 Point x int 8 final
//! .method-ref 3 Math max int,int int
//! .type 4 java/lang/Object
//!
//! .method count stack=2 locals=2 params=int returns=int static
//! loop:
//!     iload 0
//!     ifle done
//!     iinc 0 -1
//!     goto loop
//! done:
//!     iload 0
//!     ireturn
//! ```
//!
//! Operations use the instruction set mnemonics. Branches name labels, switches list
//! their case labels comma-separated (`tableswitch 10 a,b,c dflt`,
//! `lookupswitch 1:a,7:b dflt`).

use std::str::FromStr;

use anyhow::{anyhow, bail, Context};
use hirforge::prelude::*;
use strum::IntoEnumIterator;

/// Pool entries and the methods of one listing file.
pub struct Listing {
    pub resolver: StaticResolver,
    pub methods: Vec<MethodCode>,
}

impl Listing {
    /// Returns the method called `name`, or the only method when `name` is `None`.
    pub fn method(&self, name: Option<&str>) -> anyhow::Result<&MethodCode> {
        match name {
            Some(name) => self
                .methods
                .iter()
                .find(|m| m.info().name == name)
                .ok_or_else(|| anyhow!("no method named '{name}' in listing")),
            None => match self.methods.as_slice() {
                [only] => Ok(only),
                [] => bail!("listing contains no methods"),
                _ => bail!(
                    "listing contains {} methods, select one with --method",
                    self.methods.len()
                ),
            },
        }
    }
}

struct OpenMethod {
    info: MethodInfo,
    asm: BytecodeAssembler,
}

/// Parses a complete listing.
pub fn parse(source: &str) -> anyhow::Result<Listing> {
    let mut resolver = StaticResolver::new();
    let mut methods = Vec::new();
    let mut open: Option<OpenMethod> = None;

    for (number, raw) in source.lines().enumerate() {
        let line = raw.split(';').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let context = || format!("line {}: {}", number + 1, raw.trim());
        let words: Vec<&str> = line.split_whitespace().collect();

        match words[0] {
            ".method" => {
                if let Some(done) = open.take() {
                    methods.push(done.asm.finish_method(done.info).with_context(context)?);
                }
                open = Some(OpenMethod {
                    info: parse_header(&words[1..]).with_context(context)?,
                    asm: BytecodeAssembler::new(),
                });
            }
            ".end" => {
                let done = open
                    .take()
                    .ok_or_else(|| anyhow!(".end outside of a method"))
                    .with_context(context)?;
                methods.push(done.asm.finish_method(done.info).with_context(context)?);
            }
            ".const" | ".field" | ".method-ref" | ".type" => {
                parse_pool_entry(&mut resolver, &words).with_context(context)?;
            }
            label if label.ends_with(':') && words.len() == 1 => {
                let method = open
                    .as_mut()
                    .ok_or_else(|| anyhow!("label outside of a method"))
                    .with_context(context)?;
                method
                    .asm
                    .label(label.trim_end_matches(':'))
                    .with_context(context)?;
            }
            mnemonic => {
                let method = open
                    .as_mut()
                    .ok_or_else(|| anyhow!("operation outside of a method"))
                    .with_context(context)?;
                emit(&mut method.asm, mnemonic, &words[1..]).with_context(context)?;
            }
        }
    }

    if let Some(done) = open {
        let name = done.info.name.clone();
        methods.push(
            done.asm
                .finish_method(done.info)
                .with_context(|| format!("method {name}"))?,
        );
    }

    Ok(Listing { resolver, methods })
}

fn parse_header(words: &[&str]) -> anyhow::Result<MethodInfo> {
    let (name, attrs) = words
        .split_first()
        .ok_or_else(|| anyhow!(".method needs a name"))?;

    let mut stack = None;
    let mut locals = None;
    let mut params = Vec::new();
    let mut returns = ValueKind::Void;
    let mut flags = MethodFlags::empty();

    for attr in attrs {
        match attr.split_once('=') {
            Some(("stack", n)) => stack = Some(n.parse::<u16>()?),
            Some(("locals", n)) => locals = Some(n.parse::<u16>()?),
            Some(("params", kinds)) => params = parse_kinds(kinds)?,
            Some(("returns", kind)) => returns = parse_kind(kind)?,
            Some((key, _)) => bail!("unknown method attribute '{key}'"),
            None => match *attr {
                "static" => flags |= MethodFlags::STATIC,
                "ctor" => flags |= MethodFlags::CONSTRUCTOR,
                other => bail!("unknown method flag '{other}'"),
            },
        }
    }

    let stack = stack.ok_or_else(|| anyhow!("missing stack=<n>"))?;
    let locals = locals.ok_or_else(|| anyhow!("missing locals=<n>"))?;
    Ok(MethodInfo::new(*name, stack, locals)
        .with_params(params)
        .returns(returns)
        .with_flags(flags))
}

fn parse_kind(word: &str) -> anyhow::Result<ValueKind> {
    ValueKind::from_str(word).map_err(|_| anyhow!("unknown value kind '{word}'"))
}

fn parse_kinds(list: &str) -> anyhow::Result<Vec<ValueKind>> {
    if list.is_empty() || list == "-" {
        return Ok(Vec::new());
    }
    list.split(',').map(parse_kind).collect()
}

fn parse_index(word: Option<&&str>) -> anyhow::Result<u16> {
    let word = word.ok_or_else(|| anyhow!("missing pool index"))?;
    word.trim_start_matches('#')
        .parse()
        .map_err(|_| anyhow!("invalid pool index '{word}'"))
}

fn parse_pool_entry(resolver: &mut StaticResolver, words: &[&str]) -> anyhow::Result<()> {
    let index = parse_index(words.get(1))?;
    let arg = |i: usize| {
        words
            .get(i)
            .copied()
            .ok_or_else(|| anyhow!("{} needs {} operands", words[0], i - 1))
    };

    match words[0] {
        ".const" => {
            let entry = match arg(2)? {
                "null" => ConstantEntry::Value(ConstValue::Null),
                "int" => ConstantEntry::Value(ConstValue::Int(arg(3)?.parse()?)),
                "long" => ConstantEntry::Value(ConstValue::Long(arg(3)?.parse()?)),
                "float" => ConstantEntry::Value(ConstValue::float(arg(3)?.parse()?)),
                "double" => ConstantEntry::Value(ConstValue::double(arg(3)?.parse()?)),
                "str" => {
                    let text = words[3..].join(" ");
                    ConstantEntry::Value(ConstValue::Str(text.trim_matches('"').to_string()))
                }
                "type" => ConstantEntry::Value(ConstValue::Type(TypeDesc::new(arg(3)?))),
                "unloadable" => ConstantEntry::Unloadable(words[3..].join(" ")),
                other => bail!("unknown constant kind '{other}'"),
            };
            resolver.add_constant(index, entry);
        }
        ".field" => {
            let offset = arg(5)?.parse()?;
            let mut flags = FieldFlags::empty();
            for flag in &words[6..] {
                flags |= match *flag {
                    "static" => FieldFlags::STATIC,
                    "final" => FieldFlags::FINAL,
                    "volatile" => FieldFlags::VOLATILE,
                    other => bail!("unknown field flag '{other}'"),
                };
            }
            resolver.add_field(index, arg(2)?, arg(3)?, parse_kind(arg(4)?)?, offset, flags);
        }
        ".method-ref" => {
            let params = parse_kinds(arg(4)?)?;
            resolver.add_method(index, arg(2)?, arg(3)?, params, parse_kind(arg(5)?)?);
        }
        ".type" => {
            resolver.add_type(index, arg(2)?);
        }
        other => bail!("unknown directive '{other}'"),
    }
    Ok(())
}

/// Kind selected by the one-letter mnemonic prefix.
fn prefix_kind(prefix: u8) -> Option<ValueKind> {
    Some(match prefix {
        b'i' => ValueKind::Int,
        b'l' => ValueKind::Long,
        b'f' => ValueKind::Float,
        b'd' => ValueKind::Double,
        b'a' => ValueKind::Object,
        b'b' => ValueKind::Byte,
        b'c' => ValueKind::Char,
        b's' => ValueKind::Short,
        _ => return None,
    })
}

fn find_named<T: IntoEnumIterator + ToString>(name: &str) -> Option<T> {
    T::iter().find(|candidate| candidate.to_string() == name)
}

fn emit(asm: &mut BytecodeAssembler, mnemonic: &str, args: &[&str]) -> anyhow::Result<()> {
    let arg = |i: usize| {
        args.get(i)
            .copied()
            .ok_or_else(|| anyhow!("'{mnemonic}' needs {} operand(s)", i + 1))
    };
    let index = |i: usize| -> anyhow::Result<u16> { parse_index(args.get(i)) };
    let int = |i: usize| -> anyhow::Result<i32> { Ok(arg(i)?.parse()?) };

    match mnemonic {
        "nop" => asm.nop()?,
        "aconst_null" => asm.aconst_null()?,
        "bipush" | "sipush" => asm.iconst(int(0)?)?,
        "ldc" | "ldc_w" | "ldc2_w" => asm.ldc(index(0)?)?,
        "iinc" => asm.iinc(index(0)?, arg(1)?.parse()?)?,
        "pop" => asm.pop()?,
        "pop2" => asm.pop2()?,
        "dup" => asm.dup()?,
        "dup_x1" => asm.dup_x1()?,
        "dup_x2" => asm.dup_x2()?,
        "dup2" => asm.dup2()?,
        "dup2_x1" => asm.dup2_x1()?,
        "dup2_x2" => asm.dup2_x2()?,
        "swap" => asm.swap()?,
        "arraylength" => asm.arraylength()?,
        "athrow" => asm.athrow()?,
        "monitorenter" => asm.monitorenter()?,
        "monitorexit" => asm.monitorexit()?,
        "goto" | "goto_w" => asm.goto(arg(0)?)?,
        "jsr" | "jsr_w" => asm.jsr(arg(0)?)?,
        "ret" => asm.ret(index(0)?)?,
        "return" => asm.return_void()?,
        "ifnull" => asm.ifnull(arg(0)?)?,
        "ifnonnull" => asm.ifnonnull(arg(0)?)?,
        "getfield" => asm.getfield(index(0)?)?,
        "putfield" => asm.putfield(index(0)?)?,
        "getstatic" => asm.getstatic(index(0)?)?,
        "putstatic" => asm.putstatic(index(0)?)?,
        "invokevirtual" => asm.invokevirtual(index(0)?)?,
        "invokestatic" => asm.invokestatic(index(0)?)?,
        "invokespecial" => asm.invokespecial(index(0)?)?,
        "invokeinterface" => asm.invoke(InvokeKind::Interface, index(0)?)?,
        "new" => asm.new_instance(index(0)?)?,
        "newarray" => asm.newarray(parse_kind(arg(0)?)?)?,
        "anewarray" => asm.anewarray(index(0)?)?,
        "multianewarray" => asm.multianewarray(index(0)?, arg(1)?.parse()?)?,
        "checkcast" => asm.checkcast(index(0)?)?,
        "instanceof" => asm.instanceof(index(0)?)?,
        "tableswitch" => {
            let cases: Vec<&str> = arg(1)?.split(',').collect();
            asm.tableswitch(int(0)?, &cases, arg(2)?)?
        }
        "lookupswitch" => {
            let pairs = arg(0)?
                .split(',')
                .map(|pair| {
                    let (key, label) = pair
                        .split_once(':')
                        .ok_or_else(|| anyhow!("lookupswitch case '{pair}' is not key:label"))?;
                    Ok((key.parse::<i32>()?, label))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            asm.lookupswitch(&pairs, arg(1)?)?
        }
        _ => return emit_family(asm, mnemonic, args),
    };
    Ok(())
}

/// Mnemonics built from a kind prefix, a condition code or a compare flavour.
fn emit_family(asm: &mut BytecodeAssembler, mnemonic: &str, args: &[&str]) -> anyhow::Result<()> {
    let arg = |i: usize| {
        args.get(i)
            .copied()
            .ok_or_else(|| anyhow!("'{mnemonic}' needs {} operand(s)", i + 1))
    };

    if let Some(op) = find_named::<CompareOp>(mnemonic) {
        asm.compare(op)?;
        return Ok(());
    }
    if let Some(rest) = mnemonic.strip_prefix("if_") {
        let (kind, cond) = match rest.split_at_checked(4) {
            Some(("icmp", cond)) => (ValueKind::Int, cond),
            Some(("acmp", cond)) => (ValueKind::Object, cond),
            _ => bail!("unknown mnemonic '{mnemonic}'"),
        };
        let cond = find_named::<Cond>(cond).ok_or_else(|| anyhow!("unknown condition in '{mnemonic}'"))?;
        match kind {
            ValueKind::Object => asm.if_acmp(cond, arg(0)?)?,
            _ => asm.if_icmp(cond, arg(0)?)?,
        };
        return Ok(());
    }
    if let Some(cond) = mnemonic.strip_prefix("if").and_then(find_named::<Cond>) {
        asm.if_zero(cond, arg(0)?)?;
        return Ok(());
    }

    let bytes = mnemonic.as_bytes();
    if bytes.len() == 3 && bytes[1] == b'2' {
        let from = prefix_kind(bytes[0]);
        let to = prefix_kind(bytes[2]);
        if let (Some(from), Some(to)) = (from, to) {
            asm.convert(from, to)?;
            return Ok(());
        }
    }

    let kind = bytes
        .first()
        .and_then(|b| prefix_kind(*b))
        .ok_or_else(|| anyhow!("unknown mnemonic '{mnemonic}'"))?;
    let rest = &mnemonic[1..];
    match rest {
        "load" => asm.load(kind, parse_index(args.first())?)?,
        "store" => asm.store(kind, parse_index(args.first())?)?,
        "aload" => asm.array_load(kind)?,
        "astore" => asm.array_store(kind)?,
        "return" => asm.return_value(kind)?,
        "neg" => asm.neg(kind)?,
        "const" => match kind {
            ValueKind::Long => asm.lconst(arg(0)?.parse()?)?,
            ValueKind::Float => asm.fconst(arg(0)?.parse()?)?,
            ValueKind::Double => asm.dconst(arg(0)?.parse()?)?,
            _ => asm.iconst(arg(0)?.parse()?)?,
        },
        _ => {
            if let Some(op) = find_named::<ArithOp>(rest) {
                asm.arith(op, kind)?
            } else if let Some(op) = find_named::<ShiftOp>(rest) {
                asm.shift(op, kind)?
            } else if let Some(op) = find_named::<LogicOp>(rest) {
                asm.logic(op, kind)?
            } else {
                bail!("unknown mnemonic '{mnemonic}'")
            }
        }
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNTDOWN: &str = "
        .const 1 int 7
        .method count stack=2 locals=2 params=int returns=int static
        loop:
            iload 0
            ifle done     ; exit once exhausted
            iinc 0 -1
            goto loop
        done:
            ldc 1
            ireturn
    ";

    #[test]
    fn test_parse_method_and_pool() {
        let listing = parse(COUNTDOWN).unwrap();
        assert_eq!(listing.methods.len(), 1);

        let method = listing.method(None).unwrap();
        assert_eq!(method.info().name, "count");
        assert_eq!(method.info().params, vec![ValueKind::Int]);
        assert_eq!(method.info().return_kind, ValueKind::Int);
        assert!(!method.info().has_receiver());
        assert_eq!(method.ops().len(), 6);

        assert_eq!(
            listing.resolver.resolve_constant(1).unwrap(),
            ConstantEntry::Value(ConstValue::Int(7))
        );
    }

    #[test]
    fn test_kind_prefixed_mnemonics() {
        let source = "
            .method mix stack=4 locals=4 params=long,int returns=long static
                lload 0
                iload 2
                i2l
                lshl
                lconst 3
                lxor
                lneg
                lreturn
        ";
        let listing = parse(source).unwrap();
        let mnemonics: Vec<String> = listing.methods[0]
            .ops()
            .iter()
            .map(|op| op.op.mnemonic())
            .collect();
        assert_eq!(
            mnemonics,
            ["lload", "iload", "i2l", "lshl", "lconst", "lxor", "lneg", "lreturn"]
        );
    }

    #[test]
    fn test_switches_and_conditions() {
        let source = "
            .method pick stack=2 locals=1 params=int returns=int static
                iload 0
                tableswitch 10 a,b,c other
            a:
                iload 0
                iconst 3
                if_icmpge b
            b:
                iload 0
                lookupswitch 1:c,9:other c
            c:
                iconst 1
                ireturn
            other:
                iconst 0
                ireturn
        ";
        let listing = parse(source).unwrap();
        let code = listing.method(Some("pick")).unwrap();
        let map = BlockMap::discover(code).unwrap();
        assert!(map.len() >= 5);
    }

    #[test]
    fn test_multiple_methods_need_selection() {
        let source = "
            .method a stack=1 locals=0 returns=void static
                return
            .end
            .method b stack=1 locals=0 returns=void static
                return
            .end
        ";
        let listing = parse(source).unwrap();
        assert!(listing.method(None).is_err());
        assert_eq!(listing.method(Some("b")).unwrap().info().name, "b");
        assert!(listing.method(Some("c")).is_err());
    }

    #[test]
    fn test_demo_listing_builds() {
        let listing = parse(include_str!("../demos/rotate.lst")).unwrap();
        let code = listing.method(None).unwrap();
        let map = BlockMap::discover(code).unwrap();
        let graph = HirBuilder::new(code, &map, &listing.resolver).build().unwrap();

        let mut regs = VirtualRegisters::new();
        let resolved = resolve_all(&graph, &mut regs).unwrap();
        let bound: Vec<VirtualReg> = graph
            .values()
            .iter()
            .filter_map(|value| regs.register_of(value.id))
            .collect();
        let temps = resolved
            .iter()
            .flat_map(|(_, moves)| moves)
            .filter(|mv| !bound.contains(&mv.to))
            .count();
        assert_eq!(temps, 1);
    }

    #[test]
    fn test_errors_carry_line() {
        let source = ".method bad stack=1 locals=0 static\n    iflurb x\n";
        let err = parse(source).err().unwrap();
        assert!(format!("{err:#}").contains("line 2"));

        let err = parse("    iconst 1\n").err().unwrap();
        assert!(format!("{err:#}").contains("outside of a method"));
    }
}
