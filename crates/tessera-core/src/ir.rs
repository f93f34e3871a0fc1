//! Linked intermediate representation consumed by the emitter
//!
//! The IR is produced upstream (frontend, linker, module splitter). By the time
//! it reaches the emitter every class is linked, versioned and assigned to
//! exactly one module.

use std::collections::{BTreeSet, HashMap};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::names::{ClassName, FieldName, MethodName, ModuleId};
use crate::version::Version;

/// What kind of class a [`LinkedClass`] is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    /// Ordinary class
    Class,
    /// Singleton class with a lazily created instance
    ModuleClass,
    Interface,
    /// Primitive wrapper whose instances are host primitives
    HijackedClass,
    /// Foreign (JS) class defined by this program
    JsClass,
    /// Foreign singleton defined by this program
    JsModuleClass,
    /// Foreign class provided by the host environment
    NativeJsClass,
}

impl ClassKind {
    /// Classes following the ordinary object layout
    pub fn is_class(self) -> bool {
        matches!(self, ClassKind::Class | ClassKind::ModuleClass)
    }

    pub fn is_js_class(self) -> bool {
        matches!(self, ClassKind::JsClass | ClassKind::JsModuleClass)
    }

    pub fn is_module_like(self) -> bool {
        matches!(self, ClassKind::ModuleClass | ClassKind::JsModuleClass)
    }

    /// Kinds that get a generated constructor when they have instances
    pub fn has_class_def(self) -> bool {
        self.is_class() || self.is_js_class()
    }

    /// Kinds whose public methods are emitted as free functions
    pub fn is_static_like(self) -> bool {
        matches!(self, ClassKind::Interface | ClassKind::HijackedClass)
    }
}

/// Method namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberNamespace {
    Public,
    Private,
    PublicStatic,
    PrivateStatic,
    Constructor,
    StaticConstructor,
}

impl MemberNamespace {
    pub const ALL: [MemberNamespace; 6] = [
        MemberNamespace::Public,
        MemberNamespace::Private,
        MemberNamespace::PublicStatic,
        MemberNamespace::PrivateStatic,
        MemberNamespace::Constructor,
        MemberNamespace::StaticConstructor,
    ];

    pub fn is_static(self) -> bool {
        matches!(
            self,
            MemberNamespace::PublicStatic
                | MemberNamespace::PrivateStatic
                | MemberNamespace::StaticConstructor
        )
    }
}

/// A value together with its version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub value: T,
    #[serde(default)]
    pub version: Version,
}

impl<T> Versioned<T> {
    pub fn new(value: T, version: Version) -> Self {
        Self { value, version }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Undefined,
    Null,
    Boolean(bool),
    Int(i32),
    Double(f64),
    String(String),
}

/// Method and initializer bodies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Skip,
    Block(Vec<Expr>),
    VarDef {
        name: String,
        rhs: Box<Expr>,
    },
    Assign {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Return(Box<Expr>),
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        #[serde(default)]
        else_branch: Option<Box<Expr>>,
    },
    Throw(Box<Expr>),
    Literal(Literal),
    This,
    Local(String),
    /// Free reference to a host global
    GlobalRef(String),
    /// Dynamic dispatch on an instance
    Apply {
        receiver: Box<Expr>,
        method: MethodName,
        args: Vec<Expr>,
    },
    /// Call of a public static method
    ApplyStatic {
        class: ClassName,
        method: MethodName,
        args: Vec<Expr>,
    },
    /// Call of the parent implementation of a method on `this`
    ApplySuper {
        method: MethodName,
        args: Vec<Expr>,
    },
    /// Call of a parent constructor on `this`
    ApplyConstructor {
        class: ClassName,
        ctor: MethodName,
        args: Vec<Expr>,
    },
    New {
        class: ClassName,
        ctor: MethodName,
        args: Vec<Expr>,
    },
    LoadModule(ClassName),
    LoadJsConstructor(ClassName),
    Select {
        qualifier: Box<Expr>,
        field: FieldName,
    },
    SelectStatic {
        class: ClassName,
        field: FieldName,
    },
    JsSelect {
        qualifier: Box<Expr>,
        property: String,
    },
    JsCall {
        function: Box<Expr>,
        args: Vec<Expr>,
    },
    UnaryOp {
        op: String,
        arg: Box<Expr>,
    },
    BinaryOp {
        op: String,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    IsInstanceOf {
        expr: Box<Expr>,
        class: ClassName,
    },
    AsInstanceOf {
        expr: Box<Expr>,
        class: ClassName,
    },
}

impl Expr {
    pub fn int(value: i32) -> Self {
        Expr::Literal(Literal::Int(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(value.into()))
    }

    pub fn local(name: impl Into<String>) -> Self {
        Expr::Local(name.into())
    }

    pub fn global(name: impl Into<String>) -> Self {
        Expr::GlobalRef(name.into())
    }

    pub fn ret(value: Expr) -> Self {
        Expr::Return(Box::new(value))
    }

    pub fn assign(lhs: Expr, rhs: Expr) -> Self {
        Expr::Assign {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn select_static(class: impl Into<ClassName>, field: impl Into<FieldName>) -> Self {
        Expr::SelectStatic {
            class: class.into(),
            field: field.into(),
        }
    }

    pub fn apply_static(
        class: impl Into<ClassName>,
        method: impl Into<MethodName>,
        args: Vec<Expr>,
    ) -> Self {
        Expr::ApplyStatic {
            class: class.into(),
            method: method.into(),
            args,
        }
    }

    /// Add every class this expression names to `out`
    pub fn collect_classes<'a>(&'a self, out: &mut BTreeSet<&'a ClassName>) {
        match self {
            Expr::Skip
            | Expr::Literal(_)
            | Expr::This
            | Expr::Local(_)
            | Expr::GlobalRef(_) => {}
            Expr::Block(stats) => stats.iter().for_each(|e| e.collect_classes(out)),
            Expr::VarDef { rhs, .. } => rhs.collect_classes(out),
            Expr::Assign { lhs, rhs } => {
                lhs.collect_classes(out);
                rhs.collect_classes(out);
            }
            Expr::Return(expr) | Expr::Throw(expr) => expr.collect_classes(out),
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => {
                cond.collect_classes(out);
                then_branch.collect_classes(out);
                if let Some(else_branch) = else_branch {
                    else_branch.collect_classes(out);
                }
            }
            Expr::Apply { receiver, args, .. } => {
                receiver.collect_classes(out);
                args.iter().for_each(|e| e.collect_classes(out));
            }
            Expr::ApplySuper { args, .. } => args.iter().for_each(|e| e.collect_classes(out)),
            Expr::ApplyStatic { class, args, .. }
            | Expr::ApplyConstructor { class, args, .. }
            | Expr::New { class, args, .. } => {
                out.insert(class);
                args.iter().for_each(|e| e.collect_classes(out));
            }
            Expr::LoadModule(class) | Expr::LoadJsConstructor(class) => {
                out.insert(class);
            }
            Expr::SelectStatic { class, .. } => {
                out.insert(class);
            }
            Expr::Select { qualifier, .. } | Expr::JsSelect { qualifier, .. } => {
                qualifier.collect_classes(out)
            }
            Expr::JsCall { function, args } => {
                function.collect_classes(out);
                args.iter().for_each(|e| e.collect_classes(out));
            }
            Expr::UnaryOp { arg, .. } => arg.collect_classes(out),
            Expr::BinaryOp { lhs, rhs, .. } => {
                lhs.collect_classes(out);
                rhs.collect_classes(out);
            }
            Expr::IsInstanceOf { expr, class } | Expr::AsInstanceOf { expr, class } => {
                out.insert(class);
                expr.collect_classes(out);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: MethodName,
    pub namespace: MemberNamespace,
    #[serde(default)]
    pub params: Vec<String>,
    pub body: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Int,
    Double,
    Boolean,
    Ref,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: FieldName,
    pub ty: FieldType,
    #[serde(default)]
    pub is_static: bool,
}

/// Explicit constructor of a foreign (JS) class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsConstructorDef {
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub before_super: Vec<Expr>,
    #[serde(default)]
    pub super_args: Vec<Expr>,
    #[serde(default)]
    pub after_super: Vec<Expr>,
}

/// Member exported under a host-visible name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsMemberDef {
    Method {
        name: String,
        #[serde(default)]
        is_static: bool,
        #[serde(default)]
        params: Vec<String>,
        body: Expr,
    },
    Property {
        name: String,
        #[serde(default)]
        is_static: bool,
        #[serde(default)]
        getter: Option<Expr>,
        #[serde(default)]
        setter: Option<(String, Expr)>,
    },
}

impl JsMemberDef {
    pub fn name(&self) -> &str {
        match self {
            JsMemberDef::Method { name, .. } | JsMemberDef::Property { name, .. } => name,
        }
    }
}

/// How a native class is found at runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsNativeLoadSpec {
    /// A path under the global scope, e.g. `["Intl", "Collator"]`
    Global { path: Vec<String> },
    /// A path inside an external module
    Import { module: String, path: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopLevelExportKind {
    Method {
        #[serde(default)]
        params: Vec<String>,
        body: Expr,
    },
    Module {
        class: ClassName,
    },
    JsClass {
        class: ClassName,
    },
    Field {
        class: ClassName,
        field: FieldName,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopLevelExport {
    pub export_name: String,
    pub kind: TopLevelExportKind,
    #[serde(default)]
    pub version: Version,
}

impl TopLevelExport {
    /// Class whose definition this export reads, if any
    pub fn referenced_class(&self) -> Option<&ClassName> {
        match &self.kind {
            TopLevelExportKind::Method { .. } => None,
            TopLevelExportKind::Module { class }
            | TopLevelExportKind::JsClass { class }
            | TopLevelExportKind::Field { class, .. } => Some(class),
        }
    }
}

/// Call of a public static method run when the module is loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInitializer {
    pub class: ClassName,
    pub method: MethodName,
}

/// A class after linking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedClass {
    pub name: ClassName,
    pub kind: ClassKind,
    #[serde(default)]
    pub version: Version,
    /// The class itself followed by all its superclasses and interfaces
    pub ancestors: Vec<ClassName>,
    #[serde(default)]
    pub super_class: Option<ClassName>,
    /// Explicit parent expression of a foreign class
    #[serde(default)]
    pub js_super_class: Option<Expr>,
    #[serde(default)]
    pub js_native_load_spec: Option<JsNativeLoadSpec>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub methods: Vec<Versioned<MethodDef>>,
    #[serde(default)]
    pub js_constructor: Option<Versioned<JsConstructorDef>>,
    #[serde(default)]
    pub exported_members: Vec<Versioned<JsMemberDef>>,
    #[serde(default)]
    pub has_instances: bool,
    #[serde(default)]
    pub has_instance_tests: bool,
    #[serde(default)]
    pub has_runtime_type_info: bool,
    #[serde(default)]
    pub has_module_accessor: bool,
}

impl LinkedClass {
    pub fn methods_in(
        &self,
        namespace: MemberNamespace,
    ) -> impl Iterator<Item = &Versioned<MethodDef>> + '_ {
        self.methods
            .iter()
            .filter(move |m| m.value.namespace == namespace)
    }

    pub fn constructors(&self) -> impl Iterator<Item = &Versioned<MethodDef>> + '_ {
        self.methods_in(MemberNamespace::Constructor)
    }

    pub fn static_initializer(&self) -> Option<&Versioned<MethodDef>> {
        self.methods_in(MemberNamespace::StaticConstructor).next()
    }

    pub fn instance_fields(&self) -> impl Iterator<Item = &FieldDef> + '_ {
        self.fields.iter().filter(|f| !f.is_static)
    }

    pub fn static_fields(&self) -> impl Iterator<Item = &FieldDef> + '_ {
        self.fields.iter().filter(|f| f.is_static)
    }

    pub fn defines_public_method(&self, name: &MethodName) -> bool {
        self.methods_in(MemberNamespace::Public)
            .any(|m| &m.value.name == name)
    }

    /// Classes the generated code of this class can refer to: its ancestors
    /// and every class named in its bodies
    pub fn referenced_classes(&self) -> BTreeSet<&ClassName> {
        let mut out: BTreeSet<&ClassName> = self.ancestors.iter().collect();
        out.extend(self.super_class.as_ref());
        if let Some(parent) = &self.js_super_class {
            parent.collect_classes(&mut out);
        }
        for method in &self.methods {
            method.value.body.collect_classes(&mut out);
        }
        if let Some(ctor) = &self.js_constructor {
            ctor.value
                .before_super
                .iter()
                .chain(&ctor.value.super_args)
                .chain(&ctor.value.after_super)
                .for_each(|e| e.collect_classes(&mut out));
        }
        for member in &self.exported_members {
            match &member.value {
                JsMemberDef::Method { body, .. } => body.collect_classes(&mut out),
                JsMemberDef::Property { getter, setter, .. } => {
                    if let Some(getter) = getter {
                        getter.collect_classes(&mut out);
                    }
                    if let Some((_, body)) = setter {
                        body.collect_classes(&mut out);
                    }
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    #[serde(default)]
    pub classes: Vec<LinkedClass>,
    #[serde(default)]
    pub external_dependencies: BTreeSet<String>,
    #[serde(default)]
    pub internal_dependencies: BTreeSet<ModuleId>,
    #[serde(default)]
    pub top_level_exports: Vec<TopLevelExport>,
    #[serde(default)]
    pub initializers: Vec<ModuleInitializer>,
    #[serde(default)]
    pub initializers_version: Version,
    #[serde(default)]
    pub is_root: bool,
}

/// Everything the emitter consumes in one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleSet {
    pub modules: Vec<Module>,
}

impl ModuleSet {
    pub fn new(modules: Vec<Module>) -> Self {
        Self { modules }
    }

    pub fn root_module(&self) -> Option<&Module> {
        self.modules.iter().find(|m| m.is_root)
    }

    pub fn find_class(&self, name: &ClassName) -> Option<(&Module, &LinkedClass)> {
        self.modules.iter().find_map(|module| {
            module
                .classes
                .iter()
                .find(|c| &c.name == name)
                .map(|class| (module, class))
        })
    }

    pub fn classes(&self) -> impl Iterator<Item = (&Module, &LinkedClass)> + '_ {
        self.modules
            .iter()
            .flat_map(|module| module.classes.iter().map(move |class| (module, class)))
    }

    /// Check the structural invariants the emitter relies on
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut ids = BTreeSet::new();
        for module in &self.modules {
            if !ids.insert(&module.id) {
                return Err(CoreError::DuplicateModule(module.id.to_string()));
            }
        }

        let roots: Vec<&str> = self
            .modules
            .iter()
            .filter(|m| m.is_root)
            .map(|m| m.id.as_str())
            .collect();
        match roots.len() {
            0 if !self.modules.is_empty() => return Err(CoreError::MissingRootModule),
            0 | 1 => {}
            _ => return Err(CoreError::MultipleRootModules(roots.join(", "))),
        }

        let mut owners: HashMap<&ClassName, &ModuleId> = HashMap::new();
        for module in &self.modules {
            for dependency in &module.internal_dependencies {
                if !ids.contains(dependency) {
                    return Err(CoreError::UnknownDependency {
                        module: module.id.to_string(),
                        dependency: dependency.to_string(),
                    });
                }
            }
            for class in &module.classes {
                if class.ancestors.first() != Some(&class.name) {
                    return Err(CoreError::MalformedAncestors {
                        class: class.name.to_string(),
                    });
                }
                if let Some(first) = owners.insert(&class.name, &module.id) {
                    return Err(CoreError::DuplicateClass {
                        class: class.name.to_string(),
                        first: first.to_string(),
                        second: module.id.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Modules ordered so that dependencies come first
    ///
    /// Falls back to id order when the dependency graph has cycles.
    pub fn dependency_order(&self) -> Vec<&Module> {
        let mut sorted: Vec<&Module> = self.modules.iter().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));

        let mut graph: DiGraph<usize, ()> = DiGraph::new();
        let mut nodes: HashMap<&ModuleId, NodeIndex> = HashMap::new();
        for (i, module) in sorted.iter().enumerate() {
            nodes.insert(&module.id, graph.add_node(i));
        }
        for module in &sorted {
            for dependency in &module.internal_dependencies {
                if let (Some(&from), Some(&to)) = (nodes.get(dependency), nodes.get(&module.id)) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        match toposort(&graph, None) {
            Ok(order) => order.into_iter().map(|n| sorted[graph[n]]).collect(),
            Err(cycle) => {
                tracing::debug!(
                    "Module dependency cycle through '{}', using id order",
                    sorted[graph[cycle.node_id()]].id
                );
                sorted
            }
        }
    }
}
