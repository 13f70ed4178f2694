//! Symbol loading through a module host

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use pretty_assertions::assert_eq;
use resumable::*;
use tokio::sync::Semaphore;

fn greet_module() -> ModuleExports {
    ModuleExports::new()
        .with_export(
            "sayHi",
            Value::function("sayHi", |inv| {
                let name = inv.args.first().and_then(Value::as_str).unwrap_or("world");
                Ok(Value::string(format!("hi {}", name)))
            }),
        )
        .with_export("greeting", Value::string("hello"))
}

fn loader_for(host: Arc<dyn ModuleHost>) -> Loader {
    Loader::new(Arc::new(SymbolRegistry::new()), host)
}

/// Holds every fetch until the test opens the gate.
struct GatedHost {
    fetches: AtomicUsize,
    gate: Arc<Semaphore>,
}

impl GatedHost {
    fn new() -> Self {
        Self {
            fetches: AtomicUsize::new(0),
            gate: Arc::new(Semaphore::new(0)),
        }
    }

    fn open(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ModuleHost for GatedHost {
    fn fetch_module(&self, _path: &str) -> BoxFuture<'static, Result<ModuleExports, FetchError>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let gate = Arc::clone(&self.gate);
        async move {
            let _permit = gate.acquire().await.map_err(anyhow::Error::from)?;
            Ok::<_, FetchError>(greet_module())
        }
        .boxed()
    }
}

/// Fails the first fetch, then serves the module.
#[derive(Default)]
struct FlakyHost {
    fetches: AtomicUsize,
}

impl ModuleHost for FlakyHost {
    fn fetch_module(&self, path: &str) -> BoxFuture<'static, Result<ModuleExports, FetchError>> {
        let attempt = self.fetches.fetch_add(1, Ordering::SeqCst);
        let result = if attempt == 0 {
            Err(FetchError::Failed(anyhow::anyhow!("{} threw during init", path)))
        } else {
            Ok(greet_module())
        };
        futures::future::ready(result).boxed()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Coalescing
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_concurrent_loads_share_one_fetch() {
    let host = Arc::new(GatedHost::new());
    let loader = loader_for(host.clone());
    let loc: Locator = "./greet.js#sayHi".parse().unwrap();

    let first = tokio::spawn(loader.load(&loc).settle());
    let second = tokio::spawn(loader.load(&loc).settle());
    for _ in 0..100 {
        if host.fetch_count() > 0 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(loader.registry().state(&loc.key()), Some(SymbolState::Pending));
    let third = loader.load(&loc);
    assert!(!third.is_ready());

    host.open();
    let a = first.await.unwrap().unwrap();
    let b = second.await.unwrap().unwrap();
    let c = third.settle().await.unwrap();

    assert_eq!(host.fetch_count(), 1);
    assert!(a.same(&b));
    assert!(a.same(&c));
    assert_eq!(loader.registry().state(&loc.key()), Some(SymbolState::Resolved));
}

#[tokio::test]
async fn test_resolved_symbol_is_ready_synchronously() {
    let host = Arc::new(StaticModules::new().with_module("./greet.js", greet_module()));
    let loader = loader_for(host.clone());
    let loc: Locator = "./greet.js#greeting".parse().unwrap();

    assert!(!loader.load(&loc).is_ready());
    assert_eq!(loader.resolve(&loc).await.unwrap(), Value::string("hello"));

    let again = loader.load(&loc);
    assert!(again.is_ready());
    assert_eq!(again.ready(), Some(Value::string("hello")));
    assert_eq!(host.fetch_count(), 1);
}

#[tokio::test]
async fn test_symbols_from_one_module_share_its_fetch() {
    let host = Arc::new(StaticModules::new().with_module("./greet.js", greet_module()));
    let loader = loader_for(host.clone());
    let results = loader
        .prefetch(&[
            "./greet.js#sayHi".parse().unwrap(),
            "./greet.js#greeting".parse().unwrap(),
        ])
        .await;

    assert_eq!(results.len(), 2);
    assert!(results[0].as_ref().unwrap().is_callable());
    assert_eq!(results[1].as_ref().unwrap(), &Value::string("hello"));
    assert_eq!(host.fetch_count(), 1);
    assert_eq!(loader.registry().len(), 2);
    assert_eq!(loader.registry().module_count(), 1);
}

#[tokio::test]
async fn test_captures_do_not_split_the_cache() {
    let host = Arc::new(StaticModules::new().with_module("./greet.js", greet_module()));
    let loader = loader_for(host.clone());
    let plain = loader.resolve(&"./greet.js#sayHi".parse().unwrap()).await.unwrap();
    let bound = loader
        .resolve(&"./greet.js#sayHi[4 5]?n=$.name".parse().unwrap())
        .await
        .unwrap();
    assert!(plain.same(&bound));
    assert_eq!(host.fetch_count(), 1);
}

// ═══════════════════════════════════════════════════════════════════════
// Failures
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_failed_load_is_evicted_and_retried() {
    let host = Arc::new(FlakyHost::default());
    let loader = loader_for(host.clone());
    let loc: Locator = "./greet.js#sayHi".parse().unwrap();

    let err = loader.resolve(&loc).await.unwrap_err();
    assert!(matches!(err.cause, ResolutionCause::ModuleInit { .. }));
    assert!(err.to_string().contains("threw during init"));
    assert_eq!(loader.registry().state(&loc.key()), None);
    assert_eq!(loader.registry().module_count(), 0);

    let value = loader.resolve(&loc).await.unwrap();
    assert!(value.is_callable());
    assert_eq!(host.fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_missing_module() {
    let loader = loader_for(Arc::new(StaticModules::new()));
    let err = loader.resolve(&"./nowhere.js#f".parse().unwrap()).await.unwrap_err();
    assert!(matches!(err.cause, ResolutionCause::ModuleNotFound(ref m) if m == "./nowhere.js"));
    assert_eq!(err.locator, "./nowhere.js#f");
}

#[tokio::test]
async fn test_missing_export() {
    let host = Arc::new(StaticModules::new().with_module("./greet.js", greet_module()));
    let loader = loader_for(host);
    let err = loader.resolve(&"./greet.js#sayBye".parse().unwrap()).await.unwrap_err();
    match err.cause {
        ResolutionCause::SymbolNotFound { module, symbol } => {
            assert_eq!(module, "./greet.js");
            assert_eq!(symbol, "sayBye");
        }
        other => panic!("unexpected cause {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_default_differs_from_null_default() {
    let host = Arc::new(
        StaticModules::new()
            .with_module("./empty.js", ModuleExports::new())
            .with_module("./nil.js", ModuleExports::new().with_default(Value::Null)),
    );
    let loader = loader_for(host);

    let err = loader.resolve(&"./empty.js".parse().unwrap()).await.unwrap_err();
    assert!(matches!(err.cause, ResolutionCause::SymbolNotFound { .. }));
    assert_eq!(loader.resolve(&"./nil.js".parse().unwrap()).await.unwrap(), Value::Null);
}

#[tokio::test]
async fn test_disposed_registry_refuses_loads() {
    let host = Arc::new(StaticModules::new().with_module("./greet.js", greet_module()));
    let loader = loader_for(host.clone());
    let loc: Locator = "./greet.js#greeting".parse().unwrap();
    loader.resolve(&loc).await.unwrap();

    loader.registry().dispose();
    assert!(loader.registry().is_empty());
    let err = loader.resolve(&loc).await.unwrap_err();
    assert!(matches!(err.cause, ResolutionCause::Disposed));
    assert_eq!(host.fetch_count(), 1);
}

// ═══════════════════════════════════════════════════════════════════════
// Origins and Thunks
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_loaded_function_remembers_its_locator() {
    let host = Arc::new(StaticModules::new().with_module("./greet.js", greet_module()));
    let loader = loader_for(host);
    let loc: Locator = "./greet.js#sayHi[1]?n=$.name".parse().unwrap();
    let value = loader.resolve(&loc).await.unwrap();
    let origin = value.as_function().and_then(|f| f.origin().cloned());
    assert_eq!(origin, Some("./greet.js#sayHi".parse().unwrap()));
}

#[tokio::test]
async fn test_thunk_invocation_loads_once() {
    let host = Arc::new(StaticModules::new().with_module("./greet.js", greet_module()));
    let loader = loader_for(host.clone());
    let thunk = ThunkRef::new("./greet.js#sayHi".parse().unwrap(), vec![]);
    assert_eq!(host.fetch_count(), 0);

    let ctx = InvocationContext::new().with_args(vec![Value::string("ada")]);
    assert_eq!(thunk.invoke(&loader, &ctx).await.unwrap(), Value::string("hi ada"));
    assert_eq!(thunk.invoke(&loader, &ctx).await.unwrap(), Value::string("hi ada"));
    assert_eq!(host.fetch_count(), 1);
}

#[tokio::test]
async fn test_invoking_a_non_function_export() {
    let host = Arc::new(StaticModules::new().with_module("./greet.js", greet_module()));
    let loader = loader_for(host);
    let thunk = ThunkRef::new("./greet.js#greeting".parse().unwrap(), vec![]);
    let err = thunk.invoke(&loader, &InvocationContext::new()).await.unwrap_err();
    assert!(matches!(err, InvokeError::NotCallable { found: "string", .. }));
}
