// Copyright 2018-2024 the Deno authors. All rights reserved. MIT license.
// Adapted from deno_emit.

//! Single-file emit over a resolved module graph.
//!
//! Transpiles each graph module with deno_ast, flattens the graph with the
//! SWC bundler and emits one self-contained ES module. Minification stays
//! off so deployed code remains debuggable; source maps are not produced.

use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use deno_ast::get_syntax;
use deno_ast::swc;
use deno_ast::swc::common::comments::SingleThreadedComments;
use deno_ast::swc::common::Mark;
use deno_ast::swc::parser::lexer::Lexer;
use deno_ast::swc::parser::StringInput;
use deno_ast::Marks;
use deno_ast::MediaType;
use deno_ast::ModuleSpecifier;
use deno_ast::ParseDiagnostic;
use deno_ast::SourceMap;
use deno_ast::SourceTextInfo;
use deno_ast::TranspileOptions;
use deno_graph::Module;

use super::bundle_hook::BundleHook;
use super::text::{strip_bom, transform_json_source};
use super::WarningSink;

struct BundleLoader<'a> {
    cm: &'a SourceMap,
    transpile_options: &'a TranspileOptions,
    graph: &'a deno_graph::ModuleGraph,
    warnings: &'a WarningSink,
}

impl swc::bundler::Load for BundleLoader<'_> {
    fn load(&self, file_name: &swc::common::FileName) -> Result<swc::bundler::ModuleData> {
        match file_name {
            swc::common::FileName::Url(specifier) => {
                let (source, media_type) = match self.graph.get(specifier) {
                    Some(Module::Js(m)) => (m.source.text.as_ref(), m.media_type),
                    Some(Module::Json(m)) => (m.source.text.as_ref(), m.media_type),
                    Some(
                        Module::Npm(_) | Module::Node(_) | Module::External(_) | Module::Wasm(_),
                    ) => {
                        return Err(anyhow!(
                            "Module \"{}\" was an unsupported module kind.",
                            specifier
                        ));
                    }
                    None => {
                        return Err(anyhow!(
                            "Module \"{}\" unexpectedly missing when bundling.",
                            specifier
                        ));
                    }
                };
                let (fm, module) = transpile_module(
                    specifier,
                    source,
                    media_type,
                    self.transpile_options,
                    self.cm,
                    self.warnings,
                )?;
                Ok(swc::bundler::ModuleData {
                    fm,
                    module,
                    helpers: Default::default(),
                })
            }
            _ => unreachable!(
                "Received a request for unsupported filename {:?}",
                file_name
            ),
        }
    }
}

struct BundleResolver<'a>(&'a deno_graph::ModuleGraph);

impl swc::bundler::Resolve for BundleResolver<'_> {
    fn resolve(
        &self,
        referrer: &swc::common::FileName,
        specifier: &str,
    ) -> Result<swc::loader::resolve::Resolution> {
        let referrer = if let swc::common::FileName::Url(referrer) = referrer {
            referrer
        } else {
            unreachable!(
                "An unexpected referrer was passed when bundling: {:?}",
                referrer
            );
        };

        if let Some(specifier) = self.0.resolve_dependency(specifier, referrer, false) {
            Ok(swc::loader::resolve::Resolution {
                filename: swc::common::FileName::Url(specifier.clone()),
                slug: None,
            })
        } else {
            Err(anyhow!(
                "Cannot resolve \"{}\" from \"{}\".",
                specifier,
                referrer
            ))
        }
    }
}

/// Flatten a module graph into one ES module string.
pub fn bundle_graph(graph: &deno_graph::ModuleGraph, warnings: &WarningSink) -> Result<String> {
    let globals = swc::common::Globals::new();
    swc::common::GLOBALS.set(&globals, || {
        let cm = SourceMap::default();
        let transpile_options = TranspileOptions::default();
        let loader = BundleLoader {
            graph,
            transpile_options: &transpile_options,
            cm: &cm,
            warnings,
        };
        let resolver = BundleResolver(graph);
        let config = swc::bundler::Config {
            module: swc::bundler::ModuleType::Es,
            external_modules: graph
                .modules()
                .filter_map(|m| match m {
                    Module::External(_) | Module::Node(_) | Module::Npm(_) | Module::Wasm(_) => {
                        Some(m.specifier().to_string().into())
                    }
                    Module::Js(_) | Module::Json(_) => None,
                })
                .collect(),
            ..Default::default()
        };
        // Keeps `import.meta` behavior consistent between bundled and
        // unbundled code.
        let hook = Box::new(BundleHook);
        let mut bundler = swc::bundler::Bundler::new(
            &globals,
            cm.inner().clone(),
            loader,
            resolver,
            config,
            hook,
        );
        let mut entries = HashMap::new();
        let root = graph
            .roots
            .first()
            .ok_or_else(|| anyhow!("Module graph has no root"))?;
        entries.insert(
            "bundle".to_string(),
            swc::common::FileName::Url(root.clone()),
        );
        let output = bundler
            .bundle(entries)
            .context("Unable to output during bundling")?;
        if output.is_empty() {
            return Err(anyhow!("Bundler produced no output"));
        }

        let mut buf = Vec::new();
        {
            // can't use struct expr because Config has #[non_exhaustive]
            let mut cfg = swc::codegen::Config::default();
            cfg.minify = false;
            cfg.ascii_only = false;
            cfg.target = deno_ast::ES_VERSION;
            cfg.omit_last_semi = false;
            cfg.emit_assert_for_import_attributes = false;
            let wr = Box::new(swc::codegen::text_writer::JsWriter::new(
                cm.inner().clone(),
                "\n",
                &mut buf,
                None,
            ));
            let mut emitter = swc::codegen::Emitter {
                cfg,
                cm: cm.inner().clone(),
                comments: None,
                wr,
            };
            emitter
                .emit_module(&output[0].module)
                .context("Unable to emit during bundling.")?;
        }

        String::from_utf8(buf).context("Emitted code is an invalid string.")
    })
}

/// Transpile one graph module into an SWC module, surfacing recovered parse
/// diagnostics as non-fatal warnings.
fn transpile_module(
    specifier: &ModuleSpecifier,
    source: &str,
    media_type: MediaType,
    options: &TranspileOptions,
    cm: &SourceMap,
    warnings: &WarningSink,
) -> Result<(Rc<swc::common::SourceFile>, swc::ast::Module)> {
    let source = strip_bom(source);
    let source = if media_type == MediaType::Json {
        transform_json_source(source)
    } else {
        source.to_string()
    };
    let source_file = cm.new_source_file(specifier.clone(), source);
    let input = StringInput::from(&*source_file);
    let comments = SingleThreadedComments::default();
    let syntax = if media_type == MediaType::Json {
        get_syntax(MediaType::JavaScript)
    } else {
        get_syntax(media_type)
    };
    let lexer = Lexer::new(syntax, deno_ast::ES_VERSION, input, Some(&comments));
    let mut parser = swc::parser::Parser::new_from(lexer);
    let module = parser.parse_module().map_err(|e| {
        ParseDiagnostic::from_swc_error(
            e,
            specifier,
            SourceTextInfo::from_string(source_file.src.to_string()),
        )
    })?;
    let diagnostics = {
        let diagnostics = parser.take_errors();
        if diagnostics.is_empty() {
            Vec::new()
        } else {
            let info = SourceTextInfo::from_string(source_file.src.to_string());
            diagnostics
                .into_iter()
                .map(|e| ParseDiagnostic::from_swc_error(e, specifier, info.clone()))
                .collect::<Vec<_>>()
        }
    };
    for diagnostic in &diagnostics {
        warnings.push(format!("{}", diagnostic));
    }

    let marks = Marks {
        top_level: Mark::fresh(Mark::root()),
        unresolved: Mark::new(),
    };
    let program = deno_ast::fold_program(
        swc::ast::Program::Module(module),
        options,
        cm,
        &comments,
        &marks,
        Box::new(diagnostics.iter()),
    )?;
    let module = match program {
        swc::ast::Program::Module(module) => module,
        _ => unreachable!(),
    };

    Ok((source_file, module))
}
