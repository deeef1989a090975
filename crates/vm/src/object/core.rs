//! Reference-counted object storage.
//!
//! Every object is an [`Arc`] around a [`PyInner`] whose payload is erased to
//! `dyn PyObjectPayload`. Typed handles ([`PyRef<T>`]) keep the concrete payload type and coerce
//! into [`PyObjectRef`] for free.

use super::payload::{PyObjectPayload, PyPayload};
use crate::builtins::{PyType, PyTypeRef};
use indexmap::IndexMap;
use pyslot_common::lock::{PyRwLock, PyRwLockReadGuard};
use core::{any::type_name, fmt, ops::Deref};
use std::sync::{Arc, OnceLock, Weak};

/// Attribute storage of instances and types. Insertion order is kept, like a Python dict.
pub type PyAttributes = IndexMap<String, PyObjectRef>;

pub struct PyInner<T: ?Sized> {
    class: OnceLock<PyTypeRef>,
    dict: Option<PyRwLock<PyAttributes>>,
    pub(crate) payload: T,
}

/// The type-erased object. Always handled behind a [`PyObjectRef`] or a `&PyObject`.
pub type PyObject = PyInner<dyn PyObjectPayload>;

impl PyObject {
    #[inline]
    pub fn class(&self) -> &PyTypeRef {
        match self.class.get() {
            Some(class) => class,
            None => unreachable!("object class is set right after the type hierarchy is created"),
        }
    }

    pub(crate) fn init_class(&self, class: PyTypeRef) {
        if self.class.set(class).is_err() {
            panic!("object class can only be initialized once");
        }
    }

    #[inline]
    pub fn payload_is<T: PyPayload>(&self) -> bool {
        self.payload.as_any().is::<T>()
    }

    #[inline]
    pub fn payload<T: PyPayload>(&self) -> Option<&T> {
        self.payload.as_any().downcast_ref::<T>()
    }

    /// Payload of `T` only if the object's class is exactly `T`'s class.
    pub fn payload_if_exact<'a, T: PyPayload>(&'a self, ctx: &crate::Context) -> Option<&'a T> {
        if self.class().is(T::class(ctx)) {
            self.payload()
        } else {
            None
        }
    }

    #[inline]
    pub fn dict(&self) -> Option<&PyRwLock<PyAttributes>> {
        self.dict.as_ref()
    }

    pub fn get_dict_item(&self, name: &str) -> Option<PyObjectRef> {
        self.dict.as_ref()?.read().get(name).cloned()
    }

    /// Address based identity, stable for the object's lifetime.
    #[inline]
    pub fn get_id(&self) -> usize {
        self as *const Self as *const () as usize
    }

    #[inline]
    pub fn is<T: ?Sized>(&self, other: &PyInner<T>) -> bool {
        self.get_id() == other as *const PyInner<T> as *const () as usize
    }

    #[inline]
    pub fn fast_isinstance(&self, typ: &PyType) -> bool {
        self.class().fast_issubclass(typ)
    }
}

impl fmt::Debug for PyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.class.get() {
            Some(class) => write!(f, "<{} object at {:#x}>", class.name(), self.get_id()),
            None => write!(f, "<uninitialized object at {:#x}>", self.get_id()),
        }
    }
}

/// Owned reference to any object.
#[derive(Clone)]
#[repr(transparent)]
pub struct PyObjectRef(Arc<PyObject>);

impl PyObjectRef {
    #[inline]
    pub fn is(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> PyWeak {
        PyWeak(Arc::downgrade(&self.0))
    }

    pub fn downcast<T: PyPayload>(self) -> Result<PyRef<T>, Self> {
        if self.payload_is::<T>() {
            let raw = Arc::into_raw(self.0) as *const PyInner<T>;
            // SAFETY: the payload was just checked to be a `T`, so the allocation holds a
            // `PyInner<T>`; dropping the metadata of the fat pointer keeps the same address.
            Ok(PyRef {
                inner: unsafe { Arc::from_raw(raw) },
            })
        } else {
            Err(self)
        }
    }

    pub fn downcast_ref<T: PyPayload>(&self) -> Option<PyRef<T>> {
        self.clone().downcast().ok()
    }

    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl Deref for PyObjectRef {
    type Target = PyObject;

    #[inline]
    fn deref(&self) -> &PyObject {
        &self.0
    }
}

impl fmt::Debug for PyObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}

/// Non-owning reference. Slot values hold their callables this way; the owning type's
/// attribute storage keeps them alive.
#[derive(Clone)]
pub struct PyWeak(Weak<PyObject>);

impl PyWeak {
    pub fn upgrade(&self) -> Option<PyObjectRef> {
        self.0.upgrade().map(PyObjectRef)
    }

    /// Identity comparison that does not require the referent to be alive.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }

    pub fn refers_to(&self, obj: &PyObject) -> bool {
        self.0.as_ptr() as *const () as usize == obj.get_id()
    }
}

impl fmt::Debug for PyWeak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(obj) => write!(f, "<weak {obj:?}>"),
            None => f.write_str("<dead weak reference>"),
        }
    }
}

/// Owned reference to an object whose payload is known to be `T`.
pub struct PyRef<T: PyPayload> {
    inner: Arc<PyInner<T>>,
}

impl<T: PyPayload> PyRef<T> {
    pub fn new_ref(payload: T, typ: PyTypeRef, dict: Option<PyAttributes>) -> Self {
        let class = OnceLock::new();
        let _ = class.set(typ);
        Self::from_inner(class, dict, payload)
    }

    /// Object whose class is assigned later with [`PyObject::init_class`]. Only used while the
    /// `type`/`object` pair is bootstrapped.
    pub(crate) fn new_uninit(payload: T, dict: Option<PyAttributes>) -> Self {
        Self::from_inner(OnceLock::new(), dict, payload)
    }

    fn from_inner(class: OnceLock<PyTypeRef>, dict: Option<PyAttributes>, payload: T) -> Self {
        Self {
            inner: Arc::new(PyInner {
                class,
                dict: dict.map(PyRwLock::new),
                payload,
            }),
        }
    }

    #[inline]
    pub fn as_object(&self) -> &PyObject {
        let obj: &PyInner<T> = &self.inner;
        obj
    }

    #[inline]
    pub fn to_object(&self) -> PyObjectRef {
        self.clone().into()
    }

    #[inline]
    pub fn is<U: PyPayload>(&self, other: &PyRef<U>) -> bool {
        self.as_object().is(other.as_object())
    }

    pub fn downgrade(&self) -> PyWeak {
        let obj: Arc<PyObject> = self.inner.clone();
        PyWeak(Arc::downgrade(&obj))
    }

    pub fn class(&self) -> &PyTypeRef {
        self.as_object().class()
    }

    #[inline]
    pub fn fast_isinstance(&self, typ: &PyType) -> bool {
        self.as_object().fast_isinstance(typ)
    }

    pub fn dict_read(&self) -> Option<PyRwLockReadGuard<'_, PyAttributes>> {
        self.inner.dict.as_ref().map(|d| d.read())
    }
}

impl<T: PyPayload> Clone for PyRef<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: PyPayload> Deref for PyRef<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.inner.payload
    }
}

impl<T: PyPayload> From<PyRef<T>> for PyObjectRef {
    #[inline]
    fn from(value: PyRef<T>) -> Self {
        let obj: Arc<PyObject> = value.inner;
        Self(obj)
    }
}

impl<T: PyPayload> fmt::Debug for PyRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PyRef<{}>({:?})", type_name::<T>(), &self.inner.payload)
    }
}
