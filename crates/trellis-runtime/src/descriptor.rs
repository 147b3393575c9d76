//! Part descriptors: templates for parts created by id.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

/// Item template inside a [`MenuTemplate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemTemplate {
    pub label: String,
    pub command: Option<String>,
}

/// Menu or toolbar template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuTemplate {
    pub label: String,
    pub items: Vec<ItemTemplate>,
}

impl MenuTemplate {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            items: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_item(mut self, label: impl Into<String>, command: Option<&str>) -> Self {
        self.items.push(ItemTemplate {
            label: label.into(),
            command: command.map(str::to_string),
        });
        self
    }
}

/// Template consulted by `show` and `create_part`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartDescriptor {
    pub id: String,
    pub label: String,
    /// Tag of the stack new instances are placed in.
    pub category: Option<String>,
    pub allow_multiple: bool,
    /// Instances live in the window's shared pool behind placeholders.
    pub shared: bool,
    pub closeable: bool,
    pub tags: Vec<String>,
    pub properties: BTreeMap<String, String>,
    pub contribution_uri: Option<String>,
    pub menus: Vec<MenuTemplate>,
    pub toolbar: Option<MenuTemplate>,
}

impl PartDescriptor {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            closeable: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn allow_multiple(mut self, allow: bool) -> Self {
        self.allow_multiple = allow;
        self
    }

    #[must_use]
    pub fn shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    #[must_use]
    pub fn closeable(mut self, closeable: bool) -> Self {
        self.closeable = closeable;
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.properties.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_contribution_uri(mut self, uri: impl Into<String>) -> Self {
        self.contribution_uri = Some(uri.into());
        self
    }

    #[must_use]
    pub fn with_menu(mut self, menu: MenuTemplate) -> Self {
        self.menus.push(menu);
        self
    }

    #[must_use]
    pub fn with_toolbar(mut self, toolbar: MenuTemplate) -> Self {
        self.toolbar = Some(toolbar);
        self
    }
}

/// Descriptor lookup by part id.
pub trait DescriptorRegistry {
    fn lookup(&self, id: &str) -> Option<&PartDescriptor>;
}

/// In-memory registry.
#[derive(Debug, Clone, Default)]
pub struct StaticDescriptorRegistry {
    descriptors: FxHashMap<String, PartDescriptor>,
}

impl StaticDescriptorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a descriptor, returning the previous one.
    pub fn register(&mut self, descriptor: PartDescriptor) -> Option<PartDescriptor> {
        self.descriptors.insert(descriptor.id.clone(), descriptor)
    }

    #[must_use]
    pub fn with(mut self, descriptor: PartDescriptor) -> Self {
        let _ = self.register(descriptor);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl DescriptorRegistry for StaticDescriptorRegistry {
    fn lookup(&self, id: &str) -> Option<&PartDescriptor> {
        self.descriptors.get(id)
    }
}

impl FromIterator<PartDescriptor> for StaticDescriptorRegistry {
    fn from_iter<I: IntoIterator<Item = PartDescriptor>>(iter: I) -> Self {
        let mut registry = Self::new();
        for descriptor in iter {
            let _ = registry.register(descriptor);
        }
        registry
    }
}
