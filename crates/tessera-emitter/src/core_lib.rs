//! Bootstrap library emitted into the root module
//!
//! Split in three parts because of initialization order: helpers the root
//! class may call are defined before it, runtime type support that refers to
//! the root class follows it, and primitive type data is created once every
//! class is defined.

use tessera_core::ClassName;

use crate::codegen::CodegenCtx;
use crate::globals::{GlobalRefs, WithGlobals};
use crate::tree::{Ident, PropName, Tree};

#[derive(Debug, Clone, PartialEq)]
pub struct CoreLib {
    /// Before the root class
    pub pre: Vec<Tree>,
    /// After the root class, before any other class
    pub post: Vec<Tree>,
    /// After all class definitions
    pub init: Vec<Tree>,
}

/// Primitive type data: (name suffix, display name)
const PRIMITIVES: &[(&str, &str)] = &[("I", "int"), ("Z", "boolean"), ("D", "double")];

fn primitive_zero(suffix: &str) -> Tree {
    match suffix {
        "Z" => Tree::Bool(false),
        "D" => Tree::Double(0.0),
        _ => Tree::Int(0),
    }
}

pub fn generate(ctx: &CodegenCtx<'_>) -> WithGlobals<CoreLib> {
    let mut globals = GlobalRefs::new();
    let names = ctx.names;
    let this_prop = |prop: &str| Tree::dot(Tree::This, prop);
    let param = |name: &str| Tree::ident(name);

    // $throwClassCastException(instance, classFullName)
    let type_error = ctx.global("TypeError", &mut globals);
    let throw_cce = Tree::function_def(
        names.core("throwClassCastException"),
        vec![Ident::new("instance"), Ident::new("classFullName")],
        Tree::Throw(Box::new(Tree::new_instance(
            type_error,
            vec![Tree::binary(
                "+",
                Tree::binary("+", param("instance"), Tree::str(" is not an instance of ")),
                param("classFullName"),
            )],
        ))),
    );

    let type_data_name = names.core("TypeData");
    let init_class_body = Tree::block(vec![
        Tree::assign(this_prop("name"), param("name")),
        Tree::assign(this_prop("isInterface"), param("isInterface")),
        Tree::assign(this_prop("ancestors"), param("ancestors")),
        Tree::ret(Tree::This),
    ]);
    let init_prim_body = Tree::block(vec![
        Tree::assign(this_prop("name"), param("name")),
        Tree::assign(this_prop("isPrimitive"), Tree::Bool(true)),
        Tree::assign(this_prop("zero"), param("zero")),
        Tree::assign(this_prop("ancestors"), Tree::ObjectConstr(Vec::new())),
        Tree::ret(Tree::This),
    ]);
    let ctor_body = Tree::block(vec![
        Tree::assign(this_prop("name"), Tree::str("")),
        Tree::assign(this_prop("isPrimitive"), Tree::Bool(false)),
        Tree::assign(this_prop("isInterface"), Tree::Bool(false)),
        Tree::assign(this_prop("zero"), Tree::Null),
        Tree::assign(this_prop("ancestors"), Tree::Null),
    ]);
    let init_class_params = vec![
        Ident::new("name"),
        Ident::new("isInterface"),
        Ident::new("ancestors"),
    ];
    let init_prim_params = vec![Ident::new("name"), Ident::new("zero")];

    let mut post = if ctx.config.use_class_syntax {
        let method = |name: &str, params: Vec<Ident>, body: Tree| Tree::MethodDef {
            is_static: false,
            name: PropName::Ident(Ident::new(name)),
            params,
            rest: None,
            body: Box::new(body),
        };
        vec![Tree::ClassDef {
            name: Ident::new(type_data_name.clone()),
            parent: None,
            members: vec![
                method("constructor", Vec::new(), ctor_body),
                method("initClass", init_class_params, init_class_body),
                method("initPrim", init_prim_params, init_prim_body),
            ],
        }]
    } else {
        let prototype = || Tree::dot(Tree::ident(type_data_name.clone()), "prototype");
        let assign_method = |name: &str, params: Vec<Ident>, body: Tree| {
            Tree::assign(
                Tree::dot(prototype(), name),
                Tree::Function {
                    params,
                    body: Box::new(body),
                },
            )
        };
        vec![
            Tree::function_def(type_data_name.clone(), Vec::new(), ctor_body),
            assign_method("initClass", init_class_params, init_class_body),
            assign_method("initPrim", init_prim_params, init_prim_body),
        ]
    };

    let root = ClassName::root();
    post.push(Tree::function_def(
        names.is_instance(&root),
        vec![Ident::new("x")],
        Tree::ret(Tree::binary("!==", param("x"), Tree::Null)),
    ));
    post.push(Tree::function_def(
        names.as_instance(&root),
        vec![Ident::new("x")],
        Tree::ret(param("x")),
    ));
    post.push(Tree::decl(
        ctx.const_kind(),
        names.type_data(&root),
        Some(Tree::apply(
            Tree::dot(
                Tree::new_instance(Tree::ident(type_data_name.clone()), Vec::new()),
                "initClass",
            ),
            vec![
                Tree::str(root.as_str()),
                Tree::Bool(false),
                Tree::ObjectConstr(vec![(PropName::Ident(Ident::new(root.encoded())), Tree::Int(1))]),
            ],
        )),
    ));

    let init = PRIMITIVES
        .iter()
        .map(|(suffix, display)| {
            Tree::decl(
                ctx.const_kind(),
                names.core(&format!("d_{}", suffix)),
                Some(Tree::apply(
                    Tree::dot(
                        Tree::new_instance(Tree::ident(type_data_name.clone()), Vec::new()),
                        "initPrim",
                    ),
                    vec![Tree::str(*display), primitive_zero(suffix)],
                )),
            )
        })
        .collect();

    WithGlobals::with(
        CoreLib {
            pre: vec![throw_cce],
            post,
            init,
        },
        globals,
    )
}

/// `$c_lang_Object.prototype.$classData = $d_lang_Object`
///
/// Emitted by the module assembler because it depends on whether the root
/// class has instances in the current run.
pub fn root_class_data(ctx: &CodegenCtx<'_>) -> Tree {
    let root = ClassName::root();
    Tree::assign(
        Tree::dot(
            Tree::dot(Tree::ident(ctx.names.class_ctor(&root)), "prototype"),
            "$classData",
        ),
        Tree::ident(ctx.names.type_data(&root)),
    )
}
