use itertools::Itertools;
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::parse::{Nothing, ParseStream};
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{
    Attribute, BinOp, Block, Error, Expr, Fields, FnArg, ForeignItem, GenericArgument, Ident, Item, ItemMod, Lit,
    LitInt, Macro, Pat, PathArguments, RangeLimits, Result, ReturnType, Signature, Stmt, Token, Type, UnOp,
    parse_macro_input,
};

#[proc_macro_attribute]
pub fn scenarios_crate(attrs: TokenStream, item: TokenStream) -> TokenStream {
    let this = quote! { crate };
    scenarios_internal(attrs, item, this)
}

/// Turn a module of scenario functions into a `Suite` bound to the module's name.
#[proc_macro_attribute]
pub fn scenarios(attrs: TokenStream, item: TokenStream) -> TokenStream {
    let this = quote! { ::objsize_oracle };
    scenarios_internal(attrs, item, this)
}

fn scenarios_internal(attrs: TokenStream, item: TokenStream, this: TokenStream2) -> TokenStream {
    let _ = parse_macro_input!(attrs as Nothing);
    let top_mod: ItemMod = parse_macro_input!(item as ItemMod);
    match parse_mod(top_mod, &this) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.into_compile_error().into(),
    }
}

fn parse_mod(top_mod: ItemMod, this: &TokenStream2) -> Result<TokenStream2> {
    let ItemMod { ident, content, .. } = top_mod;
    let Some((_, content)) = content else {
        return Err(Error::new_spanned(&ident, "expected module with body"));
    };
    let name = ident.to_string();
    let builder = quote! { suite_builder };

    let mut out_items = Vec::new();
    for item in content {
        match item {
            Item::Fn(fnc) => {
                let name = fnc.sig.ident.to_string();
                let ty = parse_signature(&fnc.sig, this)?;
                let body = parse_block(&fnc.block, this)?;
                let ignored = has_attr(&fnc.attrs, "ignore");
                out_items.push(quote! {
                    #builder.fncs.insert(#name.to_string(), #this::syntax::Fnc {
                        ty: #ty,
                        body: #body,
                        ignored: #ignored,
                    });
                });
            }
            Item::Struct(strct) => {
                let Fields::Named(fields) = &strct.fields else {
                    return Err(Error::new_spanned(&strct.fields, "only named fields are supported"));
                };
                let strct = parse_aggregate(&strct.ident, quote! { Struct }, fields.named.iter(), this)?;
                out_items.push(quote! { #builder.structs.insert(#strct); });
            }
            Item::Union(union) => {
                let union = parse_aggregate(&union.ident, quote! { Union }, union.fields.named.iter(), this)?;
                out_items.push(quote! { #builder.structs.insert(#union); });
            }
            Item::Static(global) => {
                // The initializer is not evaluated: globals start zeroed.
                let name = global.ident.to_string();
                let ty = parse_type(&global.ty, this)?;
                let thread_local = has_attr(&global.attrs, "thread_local");
                out_items.push(quote! {
                    #builder.globals.insert(#name.to_string(), #this::syntax::Global {
                        ty: #ty,
                        thread_local: #thread_local,
                    });
                });
            }
            Item::ForeignMod(foreign) => {
                for item in foreign.items {
                    let ForeignItem::Fn(fnc) = item else {
                        return Err(Error::new_spanned(item, "only functions are supported in extern blocks"));
                    };
                    let name = fnc.sig.ident.to_string();
                    let ty = parse_signature(&fnc.sig, this)?;
                    let alloc_size = parse_alloc_size(&fnc.attrs, this)?;
                    out_items.push(quote! {
                        #builder.externs.insert(#name.to_string(), #this::syntax::ExternFnc {
                            ty: #ty,
                            alloc_size: #alloc_size,
                        });
                    });
                }
            }
            _ => {
                return Err(Error::new_spanned(
                    &item,
                    "only functions, structs, unions, statics and extern blocks are supported",
                ));
            }
        }
    }

    Ok(quote! {
        let #ident = {
            let mut #builder = #this::syntax::Suite::new(#name);
            #(#out_items)*
            #builder
        };
    })
}

fn has_attr(attrs: &[Attribute], name: &str) -> bool {
    attrs.iter().any(|attr| attr.path().is_ident(name))
}

fn parse_signature(sig: &Signature, this: &TokenStream2) -> Result<TokenStream2> {
    let mut params = Vec::new();
    for param in sig.inputs.iter() {
        let FnArg::Typed(typed) = param else {
            return Err(Error::new_spanned(param, "self not supported in function parameters"));
        };
        let Pat::Ident(pat_ident) = typed.pat.as_ref() else {
            return Err(Error::new_spanned(typed, "only named parameters are supported"));
        };
        let name = pat_ident.ident.to_string();
        let ty = parse_type(&typed.ty, this)?;
        params.push(quote! { #this::syntax::FncParam { name: #name.to_string(), ty: #ty } });
    }
    let ret = match &sig.output {
        ReturnType::Default => quote! { #this::syntax::Type::Void },
        ReturnType::Type(_, ty) => parse_type(ty, this)?,
    };
    Ok(quote! {
        #this::syntax::FncType {
            params: ::std::vec![#(#params),*].into_boxed_slice(),
            ret: #ret,
        }
    })
}

fn parse_aggregate<'a>(
    ident: &Ident,
    kind: TokenStream2,
    fields: impl Iterator<Item = &'a syn::Field>,
    this: &TokenStream2,
) -> Result<TokenStream2> {
    let name = ident.to_string();
    let mut out_fields = Vec::new();
    for field in fields {
        let Some(field_name) = &field.ident else {
            return Err(Error::new_spanned(field, "only named fields are supported"));
        };
        let field_name = field_name.to_string();
        let ty = parse_type(&field.ty, this)?;
        let align = match field.attrs.iter().find(|attr| attr.path().is_ident("align")) {
            Some(attr) => {
                let align: u64 = attr.parse_args::<LitInt>()?.base10_parse()?;
                quote! { ::core::option::Option::Some(#align) }
            }
            None => quote! { ::core::option::Option::None },
        };
        out_fields.push(quote! {
            #this::syntax::StructField { name: #field_name.to_string(), ty: #ty, align: #align }
        });
    }
    Ok(quote! {
        #name.to_string(),
        #this::syntax::StructType {
            kind: #this::syntax::StructKind::#kind,
            fields: ::std::vec![#(#out_fields),*].into_boxed_slice(),
        }
    })
}

fn parse_alloc_size(attrs: &[Attribute], this: &TokenStream2) -> Result<TokenStream2> {
    let Some(attr) = attrs.iter().find(|attr| attr.path().is_ident("alloc_size")) else {
        return Ok(quote! { ::core::option::Option::None });
    };
    let positions = attr.parse_args_with(Punctuated::<LitInt, Token![,]>::parse_terminated)?;
    let positions = positions.iter().map(LitInt::base10_parse).collect::<Result<Vec<usize>>>()?;
    let (first, second) = match positions.as_slice() {
        [first] => (*first, quote! { ::core::option::Option::None }),
        [first, second] => (*first, quote! { ::core::option::Option::Some(#second) }),
        _ => return Err(Error::new_spanned(attr, "alloc_size takes one or two argument positions")),
    };
    Ok(quote! { ::core::option::Option::Some(#this::syntax::AllocSize(#first, #second)) })
}

fn int_type(size: &str, signed: bool, this: &TokenStream2) -> TokenStream2 {
    let size = Ident::new(size, proc_macro2::Span::call_site());
    quote! { #this::syntax::Type::Int { size: #this::syntax::IntSize::#size, signed: #signed } }
}

fn float_size(ty: &Type) -> Option<TokenStream2> {
    let Type::Path(path) = ty else {
        return None;
    };
    match path.path.get_ident()?.to_string().as_str() {
        "f32" => Some(quote! { F32 }),
        "f64" => Some(quote! { F64 }),
        "LongDouble" => Some(quote! { LongDouble }),
        _ => None,
    }
}

fn parse_type(ty: &Type, this: &TokenStream2) -> Result<TokenStream2> {
    match ty {
        Type::Path(path) => {
            let Some(segment) = path.path.segments.iter().exactly_one().ok() else {
                return Err(Error::new_spanned(ty, "qualified type paths are not supported"));
            };
            let name = segment.ident.to_string();
            Ok(match name.as_str() {
                "bool" => quote! { #this::syntax::Type::Bool },
                "u8" => int_type("I8", false, this),
                "i8" => int_type("I8", true, this),
                "u16" => int_type("I16", false, this),
                "i16" => int_type("I16", true, this),
                "u32" => int_type("I32", false, this),
                "i32" => int_type("I32", true, this),
                "u64" => int_type("I64", false, this),
                "i64" => int_type("I64", true, this),
                "usize" => int_type("Size", false, this),
                "isize" => int_type("Size", true, this),
                "void" => quote! { #this::syntax::Type::Void },
                "f32" | "f64" | "LongDouble" => {
                    let size = float_size(ty).unwrap_or_default();
                    quote! { #this::syntax::Type::Float(#this::syntax::FloatSize::#size) }
                }
                "Complex" => {
                    let PathArguments::AngleBracketed(args) = &segment.arguments else {
                        return Err(Error::new_spanned(segment, "expected Complex<f32>, Complex<f64> or Complex<LongDouble>"));
                    };
                    let size = match args.args.iter().exactly_one() {
                        Ok(GenericArgument::Type(inner)) => float_size(inner),
                        _ => None,
                    };
                    let Some(size) = size else {
                        return Err(Error::new_spanned(args, "expected a floating point element type"));
                    };
                    quote! { #this::syntax::Type::Complex(#this::syntax::FloatSize::#size) }
                }
                _ => quote! { #this::syntax::Type::Name(#name.to_string()) },
            })
        }
        Type::Ptr(ptr) => {
            let pointee = parse_type(&ptr.elem, this)?;
            Ok(quote! { #this::syntax::Type::Ptr(::std::boxed::Box::new(#pointee)) })
        }
        Type::Array(array) => {
            let elem = parse_type(&array.elem, this)?;
            let len = match &array.len {
                Expr::Lit(syn::ExprLit { lit: Lit::Int(len), .. }) => len.base10_parse::<u64>()?,
                len => return Err(Error::new_spanned(len, "array length must be an integer literal")),
            };
            Ok(quote! { #this::syntax::Type::Array(::std::boxed::Box::new(#elem), #len) })
        }
        Type::Tuple(tuple) if tuple.elems.is_empty() => Ok(quote! { #this::syntax::Type::Void }),
        Type::Paren(paren) => parse_type(&paren.elem, this),
        Type::Group(group) => parse_type(&group.elem, this),
        _ => Err(Error::new_spanned(ty, "unsupported type")),
    }
}

fn parse_block(block: &Block, this: &TokenStream2) -> Result<TokenStream2> {
    let mut stmts = block.stmts.iter().map(|stmt| parse_stmt(stmt, this)).collect::<Result<Vec<_>>>()?;
    // A block ending in a statement has no value.
    if !matches!(block.stmts.last(), Some(Stmt::Expr(_, None))) {
        stmts.push(quote! { #this::syntax::Expr::Unit });
    }
    Ok(quote! {
        #this::syntax::Expr::Block(
            ::std::vec![#(#stmts),*].into_boxed_slice(),
        )
    })
}

fn parse_stmt(stmt: &Stmt, this: &TokenStream2) -> Result<TokenStream2> {
    match stmt {
        Stmt::Expr(expr, _semi) => parse_expr(expr, this),
        Stmt::Macro(stmt) => parse_macro(&stmt.mac, this),
        Stmt::Local(local) => {
            let (pat, ty) = match &local.pat {
                Pat::Type(typed) => {
                    let ty = parse_type(&typed.ty, this)?;
                    (typed.pat.as_ref(), quote! { ::core::option::Option::Some(#ty) })
                }
                pat => (pat, quote! { ::core::option::Option::None }),
            };
            let Pat::Ident(pat_ident) = pat else {
                return Err(Error::new_spanned(pat, "only simple bindings are supported"));
            };
            let name = pat_ident.ident.to_string();
            let init = match &local.init {
                Some(init) if init.diverge.is_some() => {
                    return Err(Error::new_spanned(&local.pat, "let-else is not supported"));
                }
                Some(init) => {
                    let init = parse_expr(&init.expr, this)?;
                    quote! { ::core::option::Option::Some(::std::boxed::Box::new(#init)) }
                }
                None => quote! { ::core::option::Option::None },
            };
            Ok(quote! { #this::syntax::Expr::Let { name: #name.to_string(), ty: #ty, init: #init } })
        }
        Stmt::Item(item) => Err(Error::new_spanned(item, "nested items are not supported")),
    }
}

fn boxed(expr: &Expr, this: &TokenStream2) -> Result<TokenStream2> {
    let expr = parse_expr(expr, this)?;
    Ok(quote! { ::std::boxed::Box::new(#expr) })
}

fn parse_binop(op: &BinOp, this: &TokenStream2) -> Option<(TokenStream2, bool)> {
    let (name, compound) = match op {
        BinOp::Add(_) => ("Add", false),
        BinOp::Sub(_) => ("Sub", false),
        BinOp::Mul(_) => ("Mul", false),
        BinOp::Div(_) => ("Div", false),
        BinOp::Rem(_) => ("Rem", false),
        BinOp::And(_) => ("And", false),
        BinOp::Or(_) => ("Or", false),
        BinOp::BitXor(_) => ("BitXor", false),
        BinOp::BitAnd(_) => ("BitAnd", false),
        BinOp::BitOr(_) => ("BitOr", false),
        BinOp::Shl(_) => ("Shl", false),
        BinOp::Shr(_) => ("Shr", false),
        BinOp::Eq(_) => ("Eq", false),
        BinOp::Lt(_) => ("Lt", false),
        BinOp::Le(_) => ("Le", false),
        BinOp::Ne(_) => ("Ne", false),
        BinOp::Ge(_) => ("Ge", false),
        BinOp::Gt(_) => ("Gt", false),
        BinOp::AddAssign(_) => ("Add", true),
        BinOp::SubAssign(_) => ("Sub", true),
        BinOp::MulAssign(_) => ("Mul", true),
        BinOp::DivAssign(_) => ("Div", true),
        BinOp::RemAssign(_) => ("Rem", true),
        BinOp::BitXorAssign(_) => ("BitXor", true),
        BinOp::BitAndAssign(_) => ("BitAnd", true),
        BinOp::BitOrAssign(_) => ("BitOr", true),
        BinOp::ShlAssign(_) => ("Shl", true),
        BinOp::ShrAssign(_) => ("Shr", true),
        _ => return None,
    };
    let name = Ident::new(name, op.span());
    Some((quote! { #this::syntax::BinOp::#name }, compound))
}

fn parse_expr(expr: &Expr, this: &TokenStream2) -> Result<TokenStream2> {
    Ok(match expr {
        Expr::Lit(lit) => match &lit.lit {
            Lit::Int(int) => {
                let value = int.base10_parse::<i64>()?;
                quote! { #this::syntax::Expr::Const(#value) }
            }
            Lit::Bool(value) => {
                let value = i64::from(value.value);
                quote! { #this::syntax::Expr::Const(#value) }
            }
            Lit::Byte(byte) => {
                let value = i64::from(byte.value());
                quote! { #this::syntax::Expr::Const(#value) }
            }
            Lit::Str(text) => {
                let text = text.value();
                quote! { #this::syntax::Expr::Str(#text.to_string()) }
            }
            _ => return Err(Error::new_spanned(lit, "unsupported literal")),
        },
        Expr::Path(path) => {
            let Some(ident) = path.path.get_ident() else {
                return Err(Error::new_spanned(path, "expected a variable name"));
            };
            let ident = ident.to_string();
            quote! { #this::syntax::Expr::Var(#ident.to_string()) }
        }
        Expr::Binary(bin) => {
            let Some((op, compound)) = parse_binop(&bin.op, this) else {
                return Err(Error::new_spanned(&bin.op, "unsupported operator"));
            };
            let left = boxed(&bin.left, this)?;
            let right = boxed(&bin.right, this)?;
            if compound {
                quote! { #this::syntax::Expr::AssignOp { op: #op, place: #left, rhs: #right } }
            } else {
                quote! { #this::syntax::Expr::BinOp { op: #op, left: #left, right: #right } }
            }
        }
        Expr::Unary(unary) => match (&unary.op, unary.expr.as_ref()) {
            (UnOp::Neg(_), Expr::Lit(syn::ExprLit { lit: Lit::Int(int), .. })) => {
                let value = -int.base10_parse::<i64>()?;
                quote! { #this::syntax::Expr::Const(#value) }
            }
            (UnOp::Deref(_), inner) => {
                let inner = boxed(inner, this)?;
                quote! { #this::syntax::Expr::Deref(#inner) }
            }
            (UnOp::Neg(_), inner) => {
                let inner = boxed(inner, this)?;
                quote! { #this::syntax::Expr::UnOp { op: #this::syntax::UnOp::Neg, expr: #inner } }
            }
            (UnOp::Not(_), inner) => {
                let inner = boxed(inner, this)?;
                quote! { #this::syntax::Expr::UnOp { op: #this::syntax::UnOp::Not, expr: #inner } }
            }
            _ => return Err(Error::new_spanned(unary, "unsupported unary operator")),
        },
        Expr::Reference(reference) => {
            let inner = boxed(&reference.expr, this)?;
            quote! { #this::syntax::Expr::AddrOf(#inner) }
        }
        Expr::Index(index) => {
            let base = boxed(&index.expr, this)?;
            let index = boxed(&index.index, this)?;
            quote! { #this::syntax::Expr::Index { base: #base, index: #index } }
        }
        Expr::Field(field) => {
            let syn::Member::Named(name) = &field.member else {
                return Err(Error::new_spanned(&field.member, "expected a named field"));
            };
            let name = name.to_string();
            let base = boxed(&field.base, this)?;
            quote! { #this::syntax::Expr::Field { base: #base, name: #name.to_string() } }
        }
        Expr::Cast(cast) => {
            let inner = boxed(&cast.expr, this)?;
            let ty = parse_type(&cast.ty, this)?;
            quote! { #this::syntax::Expr::Cast { expr: #inner, ty: #ty } }
        }
        Expr::Paren(paren) => parse_expr(&paren.expr, this)?,
        Expr::Group(group) => parse_expr(&group.expr, this)?,
        Expr::If(ite) => {
            let cond = boxed(&ite.cond, this)?;
            let then_branch = parse_block(&ite.then_branch, this)?;
            let else_branch = match &ite.else_branch {
                Some((_, else_branch)) => {
                    let else_branch = boxed(else_branch, this)?;
                    quote! { ::core::option::Option::Some(#else_branch) }
                }
                None => quote! { ::core::option::Option::None },
            };
            quote! {
                #this::syntax::Expr::Ite {
                    cond: #cond,
                    then_branch: ::std::boxed::Box::new(#then_branch),
                    else_branch: #else_branch,
                }
            }
        }
        Expr::While(wh) => {
            let cond = boxed(&wh.cond, this)?;
            let body = parse_block(&wh.body, this)?;
            quote! { #this::syntax::Expr::While { cond: #cond, body: ::std::boxed::Box::new(#body) } }
        }
        Expr::ForLoop(for_loop) => {
            let Pat::Ident(var) = for_loop.pat.as_ref() else {
                return Err(Error::new_spanned(&for_loop.pat, "expected a loop variable"));
            };
            let Expr::Range(syn::ExprRange { start: Some(start), limits, end: Some(end), .. }) = for_loop.expr.as_ref()
            else {
                return Err(Error::new_spanned(&for_loop.expr, "expected a bounded range"));
            };
            let var = var.ident.to_string();
            let start = boxed(start, this)?;
            let end = match limits {
                RangeLimits::HalfOpen(_) => boxed(end, this)?,
                RangeLimits::Closed(_) => {
                    let end = boxed(end, this)?;
                    quote! {
                        ::std::boxed::Box::new(#this::syntax::Expr::BinOp {
                            op: #this::syntax::BinOp::Add,
                            left: #end,
                            right: ::std::boxed::Box::new(#this::syntax::Expr::Const(1)),
                        })
                    }
                }
            };
            let body = parse_block(&for_loop.body, this)?;
            quote! {
                #this::syntax::Expr::For {
                    var: #var.to_string(),
                    start: #start,
                    end: #end,
                    body: ::std::boxed::Box::new(#body),
                }
            }
        }
        Expr::Block(block) => parse_block(&block.block, this)?,
        Expr::Unsafe(block) => parse_block(&block.block, this)?,
        Expr::Assign(assign) => {
            let place = boxed(&assign.left, this)?;
            let rhs = boxed(&assign.right, this)?;
            quote! { #this::syntax::Expr::Assign { place: #place, rhs: #rhs } }
        }
        Expr::Return(ret) => match &ret.expr {
            Some(expr) => {
                let expr = boxed(expr, this)?;
                quote! { #this::syntax::Expr::Return(::core::option::Option::Some(#expr)) }
            }
            None => quote! { #this::syntax::Expr::Return(::core::option::Option::None) },
        },
        Expr::Call(call) => parse_call(call, this)?,
        Expr::Macro(mac) => parse_macro(&mac.mac, this)?,
        Expr::Tuple(tuple) if tuple.elems.is_empty() => quote! { #this::syntax::Expr::Unit },
        _ => return Err(Error::new_spanned(expr, "unsupported expression")),
    })
}

fn parse_call(call: &syn::ExprCall, this: &TokenStream2) -> Result<TokenStream2> {
    let Expr::Path(path) = call.func.as_ref() else {
        return Err(Error::new_spanned(&call.func, "expected a function name"));
    };
    let Some(segment) = path.path.segments.last() else {
        return Err(Error::new_spanned(path, "expected a function name"));
    };
    let name = segment.ident.to_string();
    let args: Vec<_> = call.args.iter().collect();
    let arity = |expected: usize| {
        if args.len() == expected {
            Ok(())
        } else {
            Err(Error::new_spanned(call, format!("{name} takes {expected} argument(s)")))
        }
    };

    Ok(match name.as_str() {
        "size_of" => {
            arity(0)?;
            let ty = match &segment.arguments {
                PathArguments::AngleBracketed(generics) => match generics.args.iter().exactly_one() {
                    Ok(GenericArgument::Type(ty)) => parse_type(ty, this)?,
                    _ => return Err(Error::new_spanned(generics, "expected one type argument")),
                },
                _ => return Err(Error::new_spanned(segment, "expected size_of::<T>()")),
            };
            quote! { #this::syntax::Expr::SizeOf(#ty) }
        }
        "size_of_val" => {
            arity(1)?;
            let arg = boxed(args[0], this)?;
            quote! { #this::syntax::Expr::SizeOfVal(#arg) }
        }
        "object_size" => {
            arity(2)?;
            let ptr = boxed(args[0], this)?;
            let kind = boxed(args[1], this)?;
            quote! { #this::syntax::Expr::ObjectSize { ptr: #ptr, kind: #kind } }
        }
        "null" | "null_mut" => {
            arity(0)?;
            quote! { #this::syntax::Expr::Null }
        }
        _ => {
            let args = args.into_iter().map(|arg| parse_expr(arg, this)).collect::<Result<Vec<_>>>()?;
            quote! {
                #this::syntax::Expr::Call {
                    name: #name.to_string(),
                    args: ::std::vec![#(#args),*].into_boxed_slice(),
                }
            }
        }
    })
}

fn parse_macro(mac: &Macro, this: &TokenStream2) -> Result<TokenStream2> {
    let Some(name) = mac.path.get_ident() else {
        return Err(Error::new_spanned(&mac.path, "unsupported macro"));
    };
    match name.to_string().as_str() {
        "check" => {
            let args = mac.parse_body_with(Punctuated::<Expr, Token![,]>::parse_terminated)?;
            let Some((actual, expected)) = args.iter().collect_tuple() else {
                return Err(Error::new_spanned(mac, "expected check!(actual, expected)"));
            };
            let line = mac.path.span().start().line as u32;
            let actual_text = tidy(&quote! { #actual }.to_string());
            let expected_text = tidy(&quote! { #expected }.to_string());
            let actual = boxed(actual, this)?;
            let expected = boxed(expected, this)?;
            Ok(quote! {
                #this::syntax::Expr::Check {
                    actual: #actual,
                    expected: #expected,
                    site: #this::syntax::Site {
                        file: ::core::file!().to_string(),
                        line: #line,
                        actual: #actual_text.to_string(),
                        expected: #expected_text.to_string(),
                    },
                }
            })
        }
        "offset_of" => {
            let (ty, field) = mac.parse_body_with(|input: ParseStream| {
                let ty: Type = input.parse()?;
                input.parse::<Token![,]>()?;
                let field: Ident = input.parse()?;
                Ok((ty, field))
            })?;
            let ty = parse_type(&ty, this)?;
            let field = field.to_string();
            Ok(quote! { #this::syntax::Expr::OffsetOf { ty: #ty, field: #field.to_string() } })
        }
        _ => Err(Error::new_spanned(mac, "unsupported macro")),
    }
}

/// Compact the token spacing of `quote!` output for messages.
fn tidy(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c != ' ' {
            out.push(c);
            continue;
        }
        let prev = out.chars().last();
        let next = chars.get(i + 1).copied();
        let drop = match (prev, next) {
            (_, Some(')' | ']' | ',' | '.' | ';')) => true,
            (Some('(' | '[' | '.'), _) => true,
            (Some(p), Some('(' | '[')) => p.is_alphanumeric() || matches!(p, '_' | '>' | ')' | ']'),
            (Some('&' | '*' | '!' | '-'), _) => {
                // Unary operator: no operand before it.
                let mut before = out.chars().rev().skip(1);
                match before.next() {
                    None | Some('(' | '[') => true,
                    Some(' ') => !matches!(before.next(), Some(c) if c.is_alphanumeric() || matches!(c, '_' | ')' | ']')),
                    _ => false,
                }
            }
            (Some(':'), _) | (_, Some(':')) => out.ends_with("::") || next == Some(':'),
            _ => false,
        };
        if !drop {
            out.push(c);
        }
    }
    out
}
