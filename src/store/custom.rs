//! [`TokenStore`] assembled from caller-supplied async operations.

// self
use crate::{
	_prelude::*,
	auth::Token,
	store::{StoreError, StoreFuture, TokenStore},
};

type GetFn = dyn Fn() -> StoreFuture<'static, Option<Token>> + Send + Sync;
type PutFn = dyn Fn(Token) -> StoreFuture<'static, ()> + Send + Sync;
type DeleteFn = dyn Fn() -> StoreFuture<'static, ()> + Send + Sync;
type ListFn = dyn Fn() -> StoreFuture<'static, Vec<Token>> + Send + Sync;

/// Token store whose four operations are plain async closures.
///
/// ```
/// use std::sync::Arc;
///
/// use oauth2_jsonapi::{
/// 	auth::Token,
/// 	store::{CustomTokenStore, TokenStore},
/// };
/// use parking_lot::Mutex;
///
/// let slot: Arc<Mutex<Option<Token>>> = Arc::new(Mutex::new(None));
/// let (get_slot, put_slot, delete_slot, list_slot) =
/// 	(slot.clone(), slot.clone(), slot.clone(), slot.clone());
/// let store = CustomTokenStore::new(
/// 	move || {
/// 		let slot = get_slot.clone();
///
/// 		async move { Ok(slot.lock().clone()) }
/// 	},
/// 	move |token| {
/// 		let slot = put_slot.clone();
///
/// 		async move {
/// 			*slot.lock() = Some(token);
///
/// 			Ok(())
/// 		}
/// 	},
/// 	move || {
/// 		let slot = delete_slot.clone();
///
/// 		async move {
/// 			slot.lock().take();
///
/// 			Ok(())
/// 		}
/// 	},
/// 	move || {
/// 		let slot = list_slot.clone();
///
/// 		async move { Ok(slot.lock().clone().into_iter().collect()) }
/// 	},
/// );
/// # let _: &dyn TokenStore = &store;
/// ```
#[derive(Clone)]
pub struct CustomTokenStore {
	get: Arc<GetFn>,
	put: Arc<PutFn>,
	delete: Arc<DeleteFn>,
	list: Arc<ListFn>,
}
impl CustomTokenStore {
	/// Builds a store from the four operations.
	pub fn new<G, GFut, P, PFut, D, DFut, L, LFut>(get: G, put: P, delete: D, list: L) -> Self
	where
		G: 'static + Send + Sync + Fn() -> GFut,
		GFut: 'static + Send + Future<Output = Result<Option<Token>, StoreError>>,
		P: 'static + Send + Sync + Fn(Token) -> PFut,
		PFut: 'static + Send + Future<Output = Result<(), StoreError>>,
		D: 'static + Send + Sync + Fn() -> DFut,
		DFut: 'static + Send + Future<Output = Result<(), StoreError>>,
		L: 'static + Send + Sync + Fn() -> LFut,
		LFut: 'static + Send + Future<Output = Result<Vec<Token>, StoreError>>,
	{
		Self {
			get: Arc::new(move || Box::pin(get()) as StoreFuture<'static, _>),
			put: Arc::new(move |token| Box::pin(put(token)) as StoreFuture<'static, _>),
			delete: Arc::new(move || Box::pin(delete()) as StoreFuture<'static, _>),
			list: Arc::new(move || Box::pin(list()) as StoreFuture<'static, _>),
		}
	}
}
impl Debug for CustomTokenStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("CustomTokenStore(..)")
	}
}
impl TokenStore for CustomTokenStore {
	fn get(&self) -> StoreFuture<'_, Option<Token>> {
		(self.get)()
	}

	fn put(&self, token: Token) -> StoreFuture<'_, ()> {
		(self.put)(token)
	}

	fn delete(&self) -> StoreFuture<'_, ()> {
		(self.delete)()
	}

	fn list(&self) -> StoreFuture<'_, Vec<Token>> {
		(self.list)()
	}
}
