// Copyright 2018-2024 the Deno authors. All rights reserved. MIT license.
// Adapted from deno_emit.

//! `import.meta` rewriting during bundling, so bundled and unbundled
//! modules observe the same `import.meta.url` / `import.meta.main` values.

use deno_ast::swc::ast::{
    Bool, Expr, KeyValueProp, Lit, MemberExpr, MemberProp, MetaPropExpr, MetaPropKind, PropName,
    Str,
};
use deno_ast::swc::bundler::{Hook, ModuleRecord};
use deno_ast::swc::common::Span;

pub struct BundleHook;

impl Hook for BundleHook {
    fn get_import_meta_props(
        &self,
        span: Span,
        module_record: &ModuleRecord,
    ) -> Result<Vec<KeyValueProp>, anyhow::Error> {
        Ok(vec![
            KeyValueProp {
                key: PropName::Ident("url".into()),
                value: Box::new(Expr::Lit(Lit::Str(Str {
                    span,
                    value: module_record.file_name.to_string().into(),
                    raw: None,
                }))),
            },
            KeyValueProp {
                key: PropName::Ident("main".into()),
                value: if module_record.is_entry {
                    Box::new(Expr::Member(MemberExpr {
                        span,
                        obj: Box::new(Expr::MetaProp(MetaPropExpr {
                            span,
                            kind: MetaPropKind::ImportMeta,
                        })),
                        prop: MemberProp::Ident("main".into()),
                    }))
                } else {
                    Box::new(Expr::Lit(Lit::Bool(Bool { span, value: false })))
                },
            },
        ])
    }
}
