//! Extensions contributing to a full build.

use propgraph::properties::{DESCRIPTOR, MIDDLEWARES, PACKAGES, VALIDATORS};
use propgraph::services::{Descriptor, Middleware, MiddlewarePriority, Validator};
use propgraph::{
    Builder, ErasedProvider, ErrorCode, EXTENSION_PRIORITY, Extension, ExtensionCandidate,
    ExtensionPayload, FilterStrategy, PayloadType, Provider, ResolvedConfig, Result,
    StaticSource,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct CustomDescriptor(&'static str);

impl Descriptor for CustomDescriptor {
    fn name(&self) -> &str {
        self.0
    }
}

#[derive(Debug)]
struct Tagged(&'static str);

impl Middleware for Tagged {
    fn name(&self) -> &str {
        self.0
    }

    fn accept(&self, _invocation: &mut Value) -> bool {
        true
    }
}

#[derive(Debug)]
struct NonEmpty;

impl Validator for NonEmpty {
    fn apply(&self, argument: &Value) -> bool {
        argument.as_str().is_some_and(|s| !s.is_empty())
    }
}

/// Contributes a descriptor named after itself.
struct DescriptorExtension {
    id: &'static str,
}

impl Extension for DescriptorExtension {
    fn id(&self) -> &str {
        self.id
    }

    fn providers(&self) -> Vec<ErasedProvider> {
        let name = self.id;
        vec![
            Provider::new(DESCRIPTOR, EXTENSION_PRIORITY, "", move |_| {
                Ok(Some(Arc::new(CustomDescriptor(name)) as Arc<dyn Descriptor>))
            })
            .erase(),
        ]
    }
}

#[derive(Debug, Clone)]
struct InjectorSettings {
    modules: Vec<&'static str>,
}

/// Contributes one middleware per configured module.
#[derive(Default)]
struct InjectorExtension {
    modules: Vec<&'static str>,
    started: Arc<AtomicBool>,
}

impl Extension for InjectorExtension {
    fn id(&self) -> &str {
        "acme.injector"
    }

    fn payload_type(&self) -> Option<PayloadType> {
        Some(PayloadType::of::<InjectorSettings>())
    }

    fn init(&mut self, payload: Option<&ExtensionPayload>) -> Result<()> {
        if let Some(payload) = payload {
            self.modules = payload.require::<InjectorSettings>(self.id())?.modules.clone();
        }
        Ok(())
    }

    fn providers(&self) -> Vec<ErasedProvider> {
        let entries: Vec<(MiddlewarePriority, Arc<dyn Middleware>)> = self
            .modules
            .iter()
            .map(|&m| (MiddlewarePriority::Normal, Arc::new(Tagged(m)) as Arc<dyn Middleware>))
            .collect();
        vec![Provider::constant(MIDDLEWARES, EXTENSION_PRIORITY, "", entries).erase()]
    }

    fn on_start(&self, config: &ResolvedConfig) {
        if config.middlewares().is_ok() {
            self.started.store(true, Ordering::SeqCst);
        }
    }
}

fn middleware_names(config: &ResolvedConfig) -> Vec<String> {
    config
        .middlewares()
        .unwrap()
        .iter()
        .map(|(_, m)| m.name().to_string())
        .collect()
}

#[test]
fn extension_beats_fallback() {
    let mut builder = Builder::new();
    builder.extension(DescriptorExtension { id: "acme.custom" });
    let config = builder.build().unwrap();
    assert_eq!(config.descriptor().unwrap().name(), "acme.custom");
    assert_eq!(config.extension_ids(), vec!["acme.custom"]);
}

#[test]
fn user_beats_extension() {
    let mut builder = Builder::new();
    builder
        .extension(DescriptorExtension { id: "acme.custom" })
        .descriptor(CustomDescriptor("mine"));
    let config = builder.build().unwrap();
    assert_eq!(config.descriptor().unwrap().name(), "mine");
}

#[test]
fn two_extensions_claiming_an_instance_are_ambiguous() {
    let mut builder = Builder::new();
    builder
        .extension(DescriptorExtension { id: "acme.one" })
        .extension(DescriptorExtension { id: "acme.two" });
    let err = builder.build().unwrap_err();
    assert_eq!(err.code(), ErrorCode::AmbiguousProvider);
    let message = err.to_string();
    assert!(message.contains("DESCRIPTOR"));
    assert!(message.contains("acme.one"));
    assert!(message.contains("acme.two"));
}

#[test]
fn user_can_settle_an_extension_tie() {
    let mut builder = Builder::new();
    builder
        .extension(DescriptorExtension { id: "acme.one" })
        .extension(DescriptorExtension { id: "acme.two" })
        .descriptor(CustomDescriptor("settled"));
    assert_eq!(builder.build().unwrap().descriptor().unwrap().name(), "settled");
}

#[test]
fn include_filter_selects_by_prefix() {
    let mut builder = Builder::new();
    builder
        .extension(DescriptorExtension { id: "acme.one" })
        .extension(DescriptorExtension { id: "legacy.two" })
        .filter_extensions(FilterStrategy::Include, ["acme."]);
    let config = builder.build().unwrap();
    assert_eq!(config.extension_ids(), vec!["acme.one"]);
    assert_eq!(config.descriptor().unwrap().name(), "acme.one");
}

#[test]
fn exclude_filter_skips_factories() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&built);
    let source = StaticSource::new()
        .with(ExtensionCandidate::new("legacy.descriptor", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::new(DescriptorExtension {
                id: "legacy.descriptor",
            })
        }))
        .with(ExtensionCandidate::instance(InjectorExtension::default()));

    let mut builder = Builder::new();
    builder
        .extension_source(source)
        .filter_extensions(FilterStrategy::Exclude, ["legacy"]);
    let config = builder.build().unwrap();
    assert_eq!(config.extension_ids(), vec!["acme.injector"]);
    assert_eq!(built.load(Ordering::SeqCst), 0);
}

#[test]
fn typed_payload_reaches_extension() {
    let started = Arc::new(AtomicBool::new(false));
    let mut builder = Builder::new();
    builder
        .extension(InjectorExtension {
            started: Arc::clone(&started),
            ..InjectorExtension::default()
        })
        .extension_data(InjectorSettings {
            modules: vec!["audit", "metrics"],
        })
        .middleware(MiddlewarePriority::High, Tagged("user"));
    let config = builder.build().unwrap();

    // extension contributions come before user ones
    assert_eq!(middleware_names(&config), vec!["audit", "metrics", "user"]);
    assert!(started.load(Ordering::SeqCst));
}

#[test]
fn targeted_payload_wins_over_typed() {
    let mut builder = Builder::new();
    builder
        .extension(InjectorExtension::default())
        .extension_data(InjectorSettings {
            modules: vec!["typed"],
        })
        .extension_data_for(
            "acme.injector",
            InjectorSettings {
                modules: vec!["targeted"],
            },
        );
    let config = builder.build().unwrap();
    assert_eq!(middleware_names(&config), vec!["targeted"]);
}

#[test]
fn mismatched_payload_fails_initialization() {
    let mut builder = Builder::new();
    builder
        .extension(InjectorExtension::default())
        .extension_data_for("acme.injector", 42u32);
    let err = builder.build().unwrap_err();
    assert_eq!(err.code(), ErrorCode::ExtensionInitialization);
    assert!(err.to_string().contains("acme.injector"));
}

#[test]
fn payload_for_extension_without_payload_type_fails() {
    let mut builder = Builder::new();
    builder
        .extension(DescriptorExtension { id: "acme.custom" })
        .extension_data_for("acme.custom", "unexpected");
    let err = builder.build().unwrap_err();
    assert_eq!(err.code(), ErrorCode::ExtensionInitialization);
}

#[test]
fn extension_cannot_provide_user_scoped_keys() {
    struct PackageGrabber;
    impl Extension for PackageGrabber {
        fn id(&self) -> &str {
            "acme.grabber"
        }
        fn providers(&self) -> Vec<ErasedProvider> {
            vec![Provider::constant(PACKAGES, EXTENSION_PRIORITY, "", vec!["x".to_string()]).erase()]
        }
    }

    let mut builder = Builder::new();
    builder.extension(PackageGrabber);
    assert_eq!(builder.build().unwrap_err().code(), ErrorCode::ScopeViolation);
}

#[test]
fn extension_providers_may_depend_on_user_values() {
    struct Echo;
    impl Extension for Echo {
        fn id(&self) -> &str {
            "acme.echo"
        }
        fn providers(&self) -> Vec<ErasedProvider> {
            vec![
                Provider::new(VALIDATORS, EXTENSION_PRIORITY, "", |ctx| {
                    let packages = ctx.get(PACKAGES)?;
                    Ok(Some(
                        packages
                            .into_iter()
                            .map(|p| (p, Arc::new(NonEmpty) as Arc<dyn Validator>))
                            .collect::<HashMap<_, _>>(),
                    ))
                })
                .erase(),
            ]
        }
    }

    let mut builder = Builder::new();
    builder.extension(Echo).packages(["com.acme"]);
    let config = builder.build().unwrap();
    let validators = config.validators().unwrap();
    assert!(validators["com.acme"].apply(&Value::String("x".into())));
}

#[test]
fn on_start_runs_after_build_in_load_order() {
    struct Recorder {
        id: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }
    impl Extension for Recorder {
        fn id(&self) -> &str {
            self.id
        }
        fn on_start(&self, config: &ResolvedConfig) {
            let packages = config.packages().unwrap_or_default();
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.id, packages.len()));
        }
    }

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut builder = Builder::new();
    builder
        .extension(Recorder {
            id: "acme.first",
            log: Arc::clone(&log),
        })
        .extension(Recorder {
            id: "acme.second",
            log: Arc::clone(&log),
        })
        .packages(["com.acme"]);
    builder.build().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["acme.first:1", "acme.second:1"]);
}
