//! Integration tests for the XML reply parsers
//!
//! Run with: cargo test --test parsers

#[cfg(test)]
mod tests {
    use navidbg::core::ExceptionHandlingAction;
    use navidbg::protocol::parsers::{
        parse_module, parse_process_start, parse_register_values, parse_target_information,
    };
    use navidbg::ParseError;
    use num_bigint::BigUint;

    #[test]
    fn register_document_round_trip() {
        let xml = r#"<Registers>
            <Thread id="1000">
                <Register name="eax" value="000000ff" memory="41414141" pc="true"/>
            </Thread>
        </Registers>"#;

        let values = parse_register_values(xml.as_bytes()).unwrap();
        assert_eq!(values.threads().len(), 1);

        let thread = values.thread(1000).unwrap();
        assert_eq!(thread.tid(), 1000);
        assert_eq!(thread.registers().len(), 1);

        let eax = &thread.registers()[0];
        assert_eq!(eax.name(), "eax");
        assert_eq!(*eax.value(), BigUint::from(255u32));
        assert!(eax.is_pc());
        assert!(!eax.is_sp());
        assert_eq!(eax.memory(), &[0x41, 0x41, 0x41, 0x41]);
        assert_eq!(thread.program_counter().map(|r| r.name()), Some("eax"));
    }

    #[test]
    fn register_values_wider_than_64_bits() {
        let xml = r#"<Registers><Thread id="1">
            <Register name="xmm0" value="0102030405060708090a0b0c0d0e0f10" memory=""/>
        </Thread></Registers>"#;

        let values = parse_register_values(xml.as_bytes()).unwrap();
        let xmm0 = &values.thread(1).unwrap().registers()[0];
        assert_eq!(xmm0.value_u64(), None);
        assert_eq!(xmm0.value().bits(), 121);
    }

    #[test]
    fn odd_length_memory_is_rejected() {
        let xml = r#"<Registers><Thread id="1"><Register name="eax" value="1" memory="414"/></Thread></Registers>"#;
        assert!(matches!(
            parse_register_values(xml.as_bytes()),
            Err(ParseError::OddLengthMemory(3))
        ));
    }

    #[test]
    fn target_information_with_detach() {
        let xml = r#"<info>
            <registers>
                <register name="EAX" size="4" editable="true"/>
                <register name="EIP" size="4" editable="true"/>
            </registers>
            <size>32</size>
            <options>
                <option name="detach" value="true"/>
                <option name="exception" exceptionName="Breakpoint" exceptionCode="2147483651" handlingAction="0"/>
            </options>
        </info>"#;

        let info = parse_target_information(xml.as_bytes()).unwrap();
        assert_eq!(info.address_size(), 32);
        assert_eq!(info.registers().len(), 2);
        assert_eq!(info.register_index("eip"), Some(1));

        let options = info.debugger_options();
        assert!(options.can_detach());
        assert!(!options.can_halt());
        assert_eq!(options.exceptions().len(), 1);

        let breakpoint = options.exception(0x8000_0003).unwrap();
        assert_eq!(breakpoint.name, "Breakpoint");
        assert_eq!(breakpoint.action, ExceptionHandlingAction::Continue);
    }

    #[test]
    fn target_information_without_size_fails() {
        let xml = r#"<info><registers/><options/></info>"#;
        assert!(matches!(
            parse_target_information(xml.as_bytes()),
            Err(ParseError::MissingElement { .. })
        ));
    }

    #[test]
    fn module_and_process_start() {
        let module = parse_module(
            br#"<module name="kernel32.dll" path="C:\Windows\kernel32.dll" address="2088763392" size="4096"/>"#,
        )
        .unwrap();
        assert_eq!(module.name(), "kernel32.dll");
        assert_eq!(module.base_address().value(), 2_088_763_392);
        assert_eq!(module.end_address().value(), 2_088_763_392 + 4096);

        let start = parse_process_start(
            br#"<processStart>
                <module name="calc.exe" path="C:\calc.exe" address="4194304" size="8192"/>
                <thread threadId="77" threadState="0"/>
            </processStart>"#,
        )
        .unwrap();
        assert_eq!(start.module.name(), "calc.exe");
        assert_eq!(start.thread.tid, 77);
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(matches!(
            parse_module(b"<module name=\"a\""),
            Err(ParseError::Xml(_))
        ));
    }
}
