use ethereum_types::H256;

error_chain! {
    links {
    }

    foreign_links {
    }

    errors {
        UnknownRoot(root: H256) {
            description("Unknown state root."),
            display("Unknown state root: {:?}", root),
        }

        KeyNotFound {
            description("Key not found."),
            display("Key not found."),
        }
    }
}
