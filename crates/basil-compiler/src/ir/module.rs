//! IR Module
//!
//! Top-level container for a compiled module.

use super::function::IrFunction;
use super::types::IrType;
use super::value::IrConstant;
use crate::error::IrError;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Deserializer, Serialize};

/// An IR module (compilation unit)
#[derive(Debug, Clone, Serialize)]
pub struct IrModule {
    /// Module name, used for diagnostics and default output naming
    pub name: String,
    /// Functions in this module (insertion order is output order)
    pub functions: Vec<IrFunction>,
    /// Module-level variables
    pub globals: Vec<IrGlobal>,
    /// Classes in this module
    pub classes: Vec<IrClass>,
    /// Names of modules this module imports
    pub dependencies: Vec<String>,
    #[serde(skip)]
    function_map: FxHashMap<String, usize>,
    #[serde(skip)]
    global_map: FxHashMap<String, usize>,
    #[serde(skip)]
    class_map: FxHashMap<String, usize>,
}

#[derive(Deserialize)]
struct RawModule {
    name: String,
    #[serde(default)]
    functions: Vec<IrFunction>,
    #[serde(default)]
    globals: Vec<IrGlobal>,
    #[serde(default)]
    classes: Vec<IrClass>,
    #[serde(default)]
    dependencies: Vec<String>,
}

impl<'de> Deserialize<'de> for IrModule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawModule::deserialize(deserializer)?;
        let mut module = IrModule {
            name: raw.name,
            functions: raw.functions,
            globals: raw.globals,
            classes: raw.classes,
            dependencies: raw.dependencies,
            function_map: FxHashMap::default(),
            global_map: FxHashMap::default(),
            class_map: FxHashMap::default(),
        };
        module.rebuild_index();
        Ok(module)
    }
}

impl IrModule {
    /// Create a new empty module
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
            globals: Vec::new(),
            classes: Vec::new(),
            dependencies: Vec::new(),
            function_map: FxHashMap::default(),
            global_map: FxHashMap::default(),
            class_map: FxHashMap::default(),
        }
    }

    /// Add a function to the module
    ///
    /// # Panics
    /// Panics if a function with the same name exists.
    pub fn add_function(&mut self, func: IrFunction) -> usize {
        assert!(
            !self.function_map.contains_key(&func.name),
            "module '{}': function '{}' added twice",
            self.name,
            func.name
        );
        let idx = self.functions.len();
        self.function_map.insert(func.name.clone(), idx);
        self.functions.push(func);
        idx
    }

    /// Add a global variable
    ///
    /// # Panics
    /// Panics if a global with the same name exists.
    pub fn add_global(&mut self, global: IrGlobal) {
        assert!(
            !self.global_map.contains_key(&global.name),
            "module '{}': global '{}' added twice",
            self.name,
            global.name
        );
        self.global_map
            .insert(global.name.clone(), self.globals.len());
        self.globals.push(global);
    }

    /// Add a class to the module
    ///
    /// # Panics
    /// Panics if a class with the same name exists.
    pub fn add_class(&mut self, class: IrClass) {
        assert!(
            !self.class_map.contains_key(&class.name),
            "module '{}': class '{}' added twice",
            self.name,
            class.name
        );
        self.class_map.insert(class.name.clone(), self.classes.len());
        self.classes.push(class);
    }

    pub fn add_dependency(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.dependencies.contains(&name) {
            self.dependencies.push(name);
        }
    }

    /// Get a function by name
    pub fn get_function(&self, name: &str) -> Option<&IrFunction> {
        self.function_map.get(name).map(|&idx| &self.functions[idx])
    }

    pub fn get_function_mut(&mut self, name: &str) -> Option<&mut IrFunction> {
        self.function_map
            .get(name)
            .copied()
            .map(|idx| &mut self.functions[idx])
    }

    pub fn get_global(&self, name: &str) -> Option<&IrGlobal> {
        self.global_map.get(name).map(|&idx| &self.globals[idx])
    }

    pub fn get_class(&self, name: &str) -> Option<&IrClass> {
        self.class_map.get(name).map(|&idx| &self.classes[idx])
    }

    /// Functions that are not class methods
    pub fn free_functions(&self) -> impl Iterator<Item = &IrFunction> {
        self.functions.iter().filter(|f| f.class.is_none())
    }

    /// Methods of the named class, in module order
    pub fn methods_of<'a>(&'a self, class: &'a str) -> impl Iterator<Item = &'a IrFunction> + 'a {
        self.functions
            .iter()
            .filter(move |f| f.class.as_deref() == Some(class))
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Get total instruction count across all functions
    pub fn total_instruction_count(&self) -> usize {
        self.functions.iter().map(|f| f.instruction_count()).sum()
    }

    /// Rebuild the name lookup maps after the vectors were edited directly
    pub fn rebuild_index(&mut self) {
        self.function_map = self
            .functions
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();
        self.global_map = self
            .globals
            .iter()
            .enumerate()
            .map(|(i, g)| (g.name.clone(), i))
            .collect();
        self.class_map = self
            .classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
    }

    /// Validate the entire module, collecting every violation
    pub fn validate(&self) -> Result<(), Vec<IrError>> {
        let mut errors = Vec::new();

        let mut names = FxHashSet::default();
        for func in &self.functions {
            if !names.insert(func.name.as_str()) {
                errors.push(IrError::DuplicateFunction(func.name.clone()));
            }
        }
        let mut names = FxHashSet::default();
        for global in &self.globals {
            if !names.insert(global.name.as_str()) {
                errors.push(IrError::DuplicateGlobal(global.name.clone()));
            }
        }
        let mut names = FxHashSet::default();
        for class in &self.classes {
            if !names.insert(class.name.as_str()) {
                errors.push(IrError::DuplicateClass(class.name.clone()));
            }
        }

        for func in &self.functions {
            errors.extend(func.errors());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// A module-level variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrGlobal {
    pub name: String,
    pub ty: IrType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer: Option<IrConstant>,
    #[serde(default)]
    pub is_const: bool,
}

impl IrGlobal {
    pub fn new(name: impl Into<String>, ty: IrType) -> Self {
        Self {
            name: name.into(),
            ty,
            initializer: None,
            is_const: false,
        }
    }

    /// A `Const` declaration with its value
    pub fn constant(name: impl Into<String>, value: IrConstant) -> Self {
        Self {
            name: name.into(),
            ty: value.ty(),
            initializer: Some(value),
            is_const: true,
        }
    }

    pub fn with_initializer(mut self, value: IrConstant) -> Self {
        self.initializer = Some(value);
        self
    }
}

/// An IR class definition; methods are functions whose `class` names it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrClass {
    pub name: String,
    /// Base class name (if any)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(default)]
    pub fields: Vec<IrField>,
}

impl IrClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: None,
            fields: Vec::new(),
        }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Add a field to this class, returning its index
    pub fn add_field(&mut self, field: IrField) -> usize {
        self.fields.push(field);
        self.fields.len() - 1
    }

    pub fn get_field(&self, name: &str) -> Option<&IrField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// An IR field definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrField {
    pub name: String,
    pub ty: IrType,
    #[serde(default)]
    pub readonly: bool,
}

impl IrField {
    pub fn new(name: impl Into<String>, ty: IrType) -> Self {
        Self {
            name: name.into(),
            ty,
            readonly: false,
        }
    }

    pub fn readonly(name: impl Into<String>, ty: IrType) -> Self {
        Self {
            name: name.into(),
            ty,
            readonly: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::block::{BasicBlock, BlockId, Terminator};

    fn make_simple_function(name: &str) -> IrFunction {
        let mut func = IrFunction::new(name, vec![], IrType::Void);
        let mut block = BasicBlock::new(BlockId(0));
        block.set_terminator(Terminator::Return(None));
        func.add_block(block);
        func
    }

    #[test]
    fn test_module_new() {
        let module = IrModule::new("test_module");
        assert_eq!(module.name, "test_module");
        assert!(module.functions.is_empty());
        assert!(module.classes.is_empty());
    }

    #[test]
    fn test_module_add_function() {
        let mut module = IrModule::new("test");
        let idx = module.add_function(make_simple_function("foo"));

        assert_eq!(idx, 0);
        assert_eq!(module.function_count(), 1);
        assert!(module.get_function("foo").is_some());
        assert!(module.get_function("bar").is_none());
    }

    #[test]
    #[should_panic(expected = "function 'foo' added twice")]
    fn test_module_duplicate_function_panics() {
        let mut module = IrModule::new("test");
        module.add_function(make_simple_function("foo"));
        module.add_function(make_simple_function("foo"));
    }

    #[test]
    fn test_module_globals_and_classes() {
        let mut module = IrModule::new("test");
        module.add_global(IrGlobal::constant("Limit", IrConstant::integer(10)));
        let mut point = IrClass::new("Point");
        point.add_field(IrField::new("X", IrType::Integer));
        module.add_class(point);

        assert!(module.get_global("Limit").unwrap().is_const);
        assert_eq!(module.get_class("Point").unwrap().fields.len(), 1);
    }

    #[test]
    fn test_module_validate() {
        let mut module = IrModule::new("test");
        module.add_function(make_simple_function("main"));
        assert!(module.validate().is_ok());

        module.functions.push(IrFunction::new("broken", vec![], IrType::Void));
        let errors = module.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_module_json_roundtrip_lookup() {
        let mut module = IrModule::new("test");
        module.add_function(make_simple_function("Main"));
        module.add_dependency("Lib");

        let json = serde_json::to_string(&module).unwrap();
        let loaded: IrModule = serde_json::from_str(&json).unwrap();
        assert!(loaded.get_function("Main").is_some());
        assert_eq!(loaded.dependencies, vec!["Lib".to_string()]);
    }
}
