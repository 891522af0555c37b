use super::super::*;
use nexus_types::{
    address,
    constants::GLOBAL_NAMESPACE,
    object::{FieldType, Standard},
};

impl<'a, S: State> Layer<'a, S> {
    // === Register Handlers ===

    pub(in crate::layer) fn handle_create(
        &mut self,
        ctx: &mut Context<'_>,
        address: Address,
        kind: Kind,
        data: &[u8],
    ) -> Result<(), EngineError> {
        if !address.is_valid() {
            return Err(invariant(format!("cannot create a register at {address}")));
        }
        if data.len() > MAX_REGISTER_SIZE {
            return Err(invariant(format!(
                "register data exceeds {MAX_REGISTER_SIZE} bytes"
            )));
        }
        if self.exists(&address)? {
            return Err(invariant(format!("register {address} already exists")));
        }

        let tag = match kind {
            Kind::Readonly => address::READONLY,
            Kind::Append => address::APPEND,
            Kind::Raw => address::RAW,
            Kind::Object => {
                let object = Object::parse(data)?;
                self.check_standard(ctx, &address, &object)?;
                object.standard().tag()
            }
            Kind::System => return Err(invariant("system registers cannot be created")),
        };
        if address.tag() != tag {
            return Err(invariant(format!(
                "address tag {:#04x} does not match register type (expected {tag:#04x})",
                address.tag()
            )));
        }

        let register = Register::new(kind, ctx.caller, ctx.timestamp, data.to_vec());
        self.commit_poststate(ctx, &address, register)
    }

    /// Field layout and value rules of the standard objects.
    fn check_standard(
        &self,
        ctx: &Context<'_>,
        address: &Address,
        object: &Object,
    ) -> Result<(), EngineError> {
        match object.standard() {
            Standard::Account => {
                if !object.check("balance", FieldType::U64, true)
                    || !object.check("token", FieldType::U256, false)
                {
                    return Err(invariant("account fields have the wrong type"));
                }
                if object.get_u64("balance")? != 0 {
                    return Err(invariant("account must be created with a zero balance"));
                }
                let token = object.get_address("token")?;
                if !token.is_null() && !self.exists(&token)? {
                    return Err(invariant(format!("token {token} does not exist")));
                }
            }
            Standard::Token => {
                if !object.check("balance", FieldType::U64, true)
                    || !object.check("token", FieldType::U256, false)
                    || !object.check("supply", FieldType::U64, false)
                    || !object.check("digits", FieldType::U8, false)
                {
                    return Err(invariant("token fields have the wrong type"));
                }
                if object.get_address("token")? != *address {
                    return Err(invariant("token identifier must equal its address"));
                }
                if object.get_u64("supply")? != object.get_u64("balance")? {
                    return Err(invariant("token supply must start in its balance"));
                }
            }
            Standard::Trust => {
                for name in ["balance", "trust", "stake"] {
                    if !object.check(name, FieldType::U64, true) || object.get_u64(name)? != 0 {
                        return Err(invariant(format!("trust field {name} must be a zero u64")));
                    }
                }
                if !object.check("token", FieldType::U256, false)
                    || !object.get_address("token")?.is_null()
                {
                    return Err(invariant("trust account must hold the native token"));
                }
                if *address != Address::trust(&ctx.caller) {
                    return Err(invariant("trust account must live at the caller's trust address"));
                }
            }
            Standard::Name => {
                let namespace = object.get_string("namespace")?;
                let name = object.get_string("name")?;
                object.get_address("address")?;
                if name.is_empty() {
                    return Err(invariant("name cannot be empty"));
                }

                let scope = if namespace.is_empty() {
                    ctx.caller
                } else if namespace == GLOBAL_NAMESPACE {
                    if name.contains(':') {
                        return Err(invariant("global names cannot contain ':'"));
                    }
                    Address::from_name(namespace, address::NAMESPACE)
                } else {
                    if name.starts_with(':') {
                        return Err(invariant("names cannot start with ':'"));
                    }
                    let scope = Address::from_name(namespace, address::NAMESPACE);
                    let register = self
                        .read_register(&scope)?
                        .ok_or_else(|| invariant(format!("namespace {namespace} does not exist")))?;
                    if register.owner != ctx.caller {
                        return Err(unauthorized(format!(
                            "caller does not own namespace {namespace}"
                        )));
                    }
                    scope
                };

                if *address != Address::from_namespace(name, &scope, address::NAME) {
                    return Err(invariant(format!("name {name} has the wrong address")));
                }
            }
            Standard::Namespace => {
                let namespace = object.get_string("namespace")?;
                if namespace.is_empty() || namespace == GLOBAL_NAMESPACE || namespace.contains(':')
                {
                    return Err(invariant(format!("invalid namespace {namespace:?}")));
                }
                if *address != Address::from_name(namespace, address::NAMESPACE) {
                    return Err(invariant(format!("namespace {namespace} has the wrong address")));
                }
            }
            Standard::Object => {}
        }
        Ok(())
    }

    pub(in crate::layer) fn handle_write(
        &mut self,
        ctx: &mut Context<'_>,
        address: Address,
        data: &[u8],
    ) -> Result<(), EngineError> {
        let mut register = self.load_prestate(ctx, &address)?;
        require_owner(&register, &ctx.caller)?;

        match register.kind {
            Kind::Raw => {
                if data.len() > MAX_REGISTER_SIZE {
                    return Err(invariant(format!(
                        "register data exceeds {MAX_REGISTER_SIZE} bytes"
                    )));
                }
                register.data = data.to_vec();
            }
            Kind::Object => {
                let mut object = register.object()?;
                for field in Object::parse(data)?.fields() {
                    object.write_field(&field.name, field.value.clone())?;
                }
                register.set_object(&object);
            }
            kind => return Err(invariant(format!("{kind:?} registers cannot be written"))),
        }

        self.commit_poststate(ctx, &address, register)
    }

    pub(in crate::layer) fn handle_append(
        &mut self,
        ctx: &mut Context<'_>,
        address: Address,
        data: &[u8],
    ) -> Result<(), EngineError> {
        let mut register = self.load_prestate(ctx, &address)?;
        require_owner(&register, &ctx.caller)?;

        if register.kind != Kind::Append {
            return Err(invariant(format!("{:?} registers cannot be appended", register.kind)));
        }
        if register.data.len() + data.len() > MAX_APPEND_SIZE {
            return Err(invariant(format!(
                "append register would exceed {MAX_APPEND_SIZE} bytes"
            )));
        }
        register.data.extend_from_slice(data);

        self.commit_poststate(ctx, &address, register)
    }
}
